use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;

use crate::db::{PgPool, PgPooledConnection};
use crate::schema::telemetry_data;
use crate::telemetry::TelemetryRecord;

/// Append-only writer for processed telemetry records.
///
/// The pipeline persists through this capability; the Postgres-backed
/// repository below is the production implementation.
#[async_trait]
pub trait TelemetryWriter: Send + Sync + 'static {
    async fn insert(&self, record: &TelemetryRecord) -> Result<()>;
}

#[derive(Clone)]
pub struct TelemetryRepository {
    pool: PgPool,
}

impl TelemetryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn get_connection(&self) -> Result<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get database connection: {}", e))
    }

    /// Insert a batch of records, chunked to keep statements bounded.
    pub async fn insert_batch(&self, records: &[TelemetryRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_connection()?;
        let mut inserted = 0;

        for chunk in records.chunks(100) {
            inserted += diesel::insert_into(telemetry_data::table)
                .values(chunk)
                .execute(&mut conn)?;
        }

        Ok(inserted)
    }
}

#[async_trait]
impl TelemetryWriter for TelemetryRepository {
    async fn insert(&self, record: &TelemetryRecord) -> Result<()> {
        let mut conn = self.get_connection()?;

        diesel::insert_into(telemetry_data::table)
            .values(record)
            .execute(&mut conn)?;

        Ok(())
    }
}
