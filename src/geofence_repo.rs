//! Geofence repository for database operations

use anyhow::Result;
use diesel::prelude::*;

use crate::db::{PgPool, PgPooledConnection};
use crate::geofence::Geofence;
use crate::schema::geofences;

#[derive(Clone)]
pub struct GeofenceRepository {
    pool: PgPool,
}

impl GeofenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn get_connection(&self) -> Result<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get database connection: {}", e))
    }

    /// All active geofences. Inactive rows are invisible to evaluation.
    pub async fn get_all_active(&self) -> Result<Vec<Geofence>> {
        let mut conn = self.get_connection()?;

        let result = geofences::table
            .filter(geofences::is_active.eq(true))
            .select(Geofence::as_select())
            .load(&mut conn)?;

        Ok(result)
    }
}
