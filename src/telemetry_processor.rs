//! Per-entry processing pipeline
//!
//! For each stream entry: resolve the aircraft, run anomaly detection,
//! persist the record, then fan out to the live feeds. The persisted row is
//! the source of truth; feed publishes are best-effort. Only a persistence
//! failure is surfaced to the consumer, which leaves the entry pending for
//! redelivery.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::aircraft::Aircraft;
use crate::anomaly_detector::AnomalyDetector;
use crate::directory::DirectoryStore;
use crate::feed_publisher::{FeedPublisher, FeedSink};
use crate::stream_consumer::StreamEntry;
use crate::telemetry::TelemetryRecord;
use crate::telemetry_repo::TelemetryWriter;

/// Why an entry could not be matched to an aircraft. Every variant is
/// non-fatal: the entry is dropped and acknowledged.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("mac address cannot be empty")]
    InvalidInput,
    #[error("aircraft not found for MAC address: {0}")]
    NotFound(String),
    #[error("failed to look up aircraft: {0}")]
    Lookup(anyhow::Error),
}

/// Entry-processing failures that must trigger broker redelivery.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to save telemetry to database: {0}")]
    Persist(anyhow::Error),
}

pub struct TelemetryProcessor<D, W, F> {
    directory: Arc<D>,
    detector: AnomalyDetector<D>,
    writer: W,
    feeds: FeedPublisher<F>,
}

impl<D, W, F> TelemetryProcessor<D, W, F>
where
    D: DirectoryStore,
    W: TelemetryWriter,
    F: FeedSink,
{
    pub fn new(directory: Arc<D>, writer: W, feeds: FeedPublisher<F>) -> Self {
        let detector = AnomalyDetector::new(Arc::clone(&directory));
        Self {
            directory,
            detector,
            writer,
            feeds,
        }
    }

    async fn resolve_aircraft(&self, mac_address: &str) -> Result<Aircraft, ResolveError> {
        if mac_address.is_empty() {
            return Err(ResolveError::InvalidInput);
        }

        match self.directory.aircraft_by_mac(mac_address).await {
            Ok(Some(aircraft)) => Ok(aircraft),
            Ok(None) => Err(ResolveError::NotFound(mac_address.to_string())),
            Err(e) => Err(ResolveError::Lookup(e)),
        }
    }

    /// Process one parsed stream entry end to end.
    pub async fn process_entry(&self, entry: StreamEntry) -> Result<(), ProcessError> {
        let aircraft = match self.resolve_aircraft(&entry.plane_id).await {
            Ok(aircraft) => aircraft,
            Err(e) => {
                // Unknown aircraft must not block the stream
                warn!(
                    "Aircraft not found, skipping entry (mac_address {}): {}",
                    entry.plane_id, e
                );
                metrics::counter!("worker.entries.unknown_aircraft").increment(1);
                return Ok(());
            }
        };

        let anomaly = self.detector.detect(aircraft.id, &entry.telemetry).await;

        let time = if entry.telemetry.timestamp == 0 {
            Utc::now()
        } else {
            DateTime::from_timestamp(entry.telemetry.timestamp as i64, 0).unwrap_or_else(Utc::now)
        };

        let record = TelemetryRecord {
            time,
            aircraft_id: aircraft.id,
            latitude: entry.telemetry.latitude,
            longitude: entry.telemetry.longitude,
            altitude: entry.telemetry.altitude,
            ground_speed: entry.telemetry.ground_speed,
            heading: entry.telemetry.heading,
            climb_rate: entry.telemetry.climb_rate,
            temperature: None,
            has_anomaly: anomaly.has_anomaly,
            anomaly_type: anomaly.kind.as_str().to_string(),
            created_at: Utc::now(),
        };

        if let Err(e) = self.writer.insert(&record).await {
            error!(
                "Failed to save telemetry to database (aircraft {}, anomaly_type '{}'): {}",
                aircraft.id, record.anomaly_type, e
            );
            return Err(ProcessError::Persist(e));
        }

        // Feed publishes stay best-effort: the record is already durable
        if let Err(e) = self.feeds.publish_global_telemetry(&record).await {
            error!(
                "Failed to publish to global feed (aircraft {}): {}",
                aircraft.id, e
            );
        }

        if anomaly.has_anomaly
            && let Err(e) = self.feeds.publish_alert(&record, &anomaly).await
        {
            error!("Failed to publish alert (aircraft {}): {}", aircraft.id, e);
        }

        debug!(
            "Processed telemetry entry (aircraft {}, has_anomaly {}, anomaly_type '{}')",
            aircraft.id, record.has_anomaly, record.anomaly_type
        );

        Ok(())
    }
}
