//! Database pool construction and embedded migrations

use anyhow::Result;
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

// Embed migrations at compile time
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/");

/// Build the connection pool shared by every repository.
pub fn build_pool(database_url: &str) -> Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(10)
        .build(manager)
        .map_err(|e| anyhow::anyhow!("Failed to create database connection pool: {e}"))?;

    info!("Database connection pool created");
    Ok(pool)
}

/// Run pending embedded migrations. Gated by the auto-migrate config flag;
/// failure here is fatal to startup.
pub fn run_migrations(pool: &PgPool) -> Result<()> {
    let mut conn = pool
        .get()
        .map_err(|e| anyhow::anyhow!("Failed to get database connection for migrations: {e}"))?;

    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;

    info!("Applied {} pending migrations", applied.len());
    Ok(())
}
