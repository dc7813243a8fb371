use anyhow::Result;
use diesel::prelude::*;

use crate::db::{PgPool, PgPooledConnection};
use crate::schema::thresholds;
use crate::threshold::{MetricName, Threshold};

#[derive(Clone)]
pub struct ThresholdRepository {
    pool: PgPool,
}

impl ThresholdRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn get_connection(&self) -> Result<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|e| anyhow::anyhow!("Failed to get database connection: {}", e))
    }

    /// Resolve the threshold for one aircraft and metric.
    ///
    /// An aircraft-specific row wins; otherwise the global default row for the
    /// metric applies; otherwise there is no threshold for the metric.
    pub async fn get_for_aircraft_and_metric(
        &self,
        aircraft_id: i64,
        metric: MetricName,
    ) -> Result<Option<Threshold>> {
        let mut conn = self.get_connection()?;

        let specific = thresholds::table
            .filter(thresholds::aircraft_id.eq(aircraft_id))
            .filter(thresholds::metric_name.eq(metric.as_str()))
            .select(Threshold::as_select())
            .first(&mut conn)
            .optional()?;

        if specific.is_some() {
            return Ok(specific);
        }

        let default = thresholds::table
            .filter(thresholds::aircraft_id.is_null())
            .filter(thresholds::metric_name.eq(metric.as_str()))
            .filter(thresholds::is_default.eq(true))
            .select(Threshold::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(default)
    }

    /// All thresholds configured for a specific aircraft.
    pub async fn get_for_aircraft(&self, aircraft_id: i64) -> Result<Vec<Threshold>> {
        let mut conn = self.get_connection()?;

        let result = thresholds::table
            .filter(thresholds::aircraft_id.eq(aircraft_id))
            .select(Threshold::as_select())
            .load(&mut conn)?;

        Ok(result)
    }

    /// All global default thresholds.
    pub async fn get_defaults(&self) -> Result<Vec<Threshold>> {
        let mut conn = self.get_connection()?;

        let result = thresholds::table
            .filter(thresholds::aircraft_id.is_null())
            .filter(thresholds::is_default.eq(true))
            .select(Threshold::as_select())
            .load(&mut conn)?;

        Ok(result)
    }
}
