use anyhow::Result;
use diesel::prelude::*;

use crate::aircraft::Aircraft;
use crate::db::{PgPool, PgPooledConnection};
use crate::schema::aircraft;

#[derive(Clone)]
pub struct AircraftRepository {
    pool: PgPool,
}

impl AircraftRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn get_connection(&self) -> Result<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get database connection: {}", e))
    }

    /// Look up an aircraft by the MAC address of its transmitter.
    pub async fn get_by_mac_address(&self, mac_address: &str) -> Result<Option<Aircraft>> {
        let mut conn = self.get_connection()?;

        let result = aircraft::table
            .filter(aircraft::mac_address.eq(mac_address))
            .select(Aircraft::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(result)
    }

    /// Look up an aircraft by its surrogate id.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Aircraft>> {
        let mut conn = self.get_connection()?;

        let result = aircraft::table
            .find(id)
            .select(Aircraft::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(result)
    }
}
