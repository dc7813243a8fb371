//! Heisenberg - telemetry-processing worker for the aircraft tracking pipeline
//!
//! Consumes raw telemetry entries from a durable broker stream via a consumer
//! group, resolves the sending aircraft, flags threshold and geofence
//! anomalies, persists the enriched record to the time-series store, and fans
//! processed records out to the global and alert feeds.

pub mod aircraft;
pub mod aircraft_repo;
pub mod anomaly_detector;
pub mod config;
pub mod db;
pub mod directory;
pub mod feed_publisher;
pub mod geofence;
pub mod geofence_repo;
pub mod schema;
pub mod stream_consumer;
pub mod stream_source;
pub mod telemetry;
pub mod telemetry_processor;
pub mod telemetry_repo;
pub mod threshold;
pub mod threshold_repo;
pub mod web;

pub use stream_consumer::{ConsumeError, StreamConsumer, StreamEntry};
pub use telemetry_processor::TelemetryProcessor;
