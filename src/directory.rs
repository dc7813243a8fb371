//! Read surface over the directory data the pipeline depends on
//!
//! Aircraft identity, per-metric thresholds, and active geofences are owned by
//! an external administration service; this worker only reads them.

use anyhow::Result;
use async_trait::async_trait;

use crate::aircraft::Aircraft;
use crate::aircraft_repo::AircraftRepository;
use crate::db::PgPool;
use crate::geofence::Geofence;
use crate::geofence_repo::GeofenceRepository;
use crate::threshold::{MetricName, Threshold};
use crate::threshold_repo::ThresholdRepository;

#[async_trait]
pub trait DirectoryStore: Send + Sync + 'static {
    /// Look up an aircraft by transmitter MAC address.
    async fn aircraft_by_mac(&self, mac_address: &str) -> Result<Option<Aircraft>>;

    /// Resolve the threshold for a metric: aircraft-specific row first, global
    /// default second, `None` when neither exists.
    async fn threshold_for(
        &self,
        aircraft_id: i64,
        metric: MetricName,
    ) -> Result<Option<Threshold>>;

    /// All currently active geofences.
    async fn active_geofences(&self) -> Result<Vec<Geofence>>;
}

/// Postgres-backed directory used in production.
#[derive(Clone)]
pub struct PgDirectory {
    aircraft: AircraftRepository,
    thresholds: ThresholdRepository,
    geofences: GeofenceRepository,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self {
            aircraft: AircraftRepository::new(pool.clone()),
            thresholds: ThresholdRepository::new(pool.clone()),
            geofences: GeofenceRepository::new(pool),
        }
    }
}

#[async_trait]
impl DirectoryStore for PgDirectory {
    async fn aircraft_by_mac(&self, mac_address: &str) -> Result<Option<Aircraft>> {
        self.aircraft.get_by_mac_address(mac_address).await
    }

    async fn threshold_for(
        &self,
        aircraft_id: i64,
        metric: MetricName,
    ) -> Result<Option<Threshold>> {
        self.thresholds
            .get_for_aircraft_and_metric(aircraft_id, metric)
            .await
    }

    async fn active_geofences(&self) -> Result<Vec<Geofence>> {
        self.geofences.get_all_active().await
    }
}
