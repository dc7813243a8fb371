//! Common test utilities: in-memory fakes for the pipeline capabilities
//!
//! The pipeline is parameterized by four capabilities (stream source,
//! directory, telemetry writer, feed sink). These fakes record every
//! interaction so tests can assert acknowledgment discipline, persisted rows,
//! and published feed messages without a broker or database.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use heisenberg::aircraft::{Aircraft, AircraftStatus};
use heisenberg::directory::DirectoryStore;
use heisenberg::feed_publisher::{FeedPublisher, FeedSink};
use heisenberg::geofence::Geofence;
use heisenberg::stream_consumer::StreamEntry;
use heisenberg::stream_source::{RawEntry, StreamSource};
use heisenberg::telemetry::{TelemetryInput, TelemetryRecord};
use heisenberg::telemetry_processor::TelemetryProcessor;
use heisenberg::telemetry_repo::TelemetryWriter;
use heisenberg::threshold::{MetricName, Threshold};

pub const GLOBAL_CHANNEL: &str = "feeds.telemetry.global";
pub const ALERT_CHANNEL: &str = "feeds.telemetry.alerts";
pub const TEST_MAC: &str = "AA:BB:CC:DD:EE:01";

/// Directory fake with the same resolution rules as the Postgres directory.
#[derive(Clone, Default)]
pub struct FakeDirectory {
    pub aircraft: HashMap<String, Aircraft>,
    pub thresholds: Vec<Threshold>,
    pub geofences: Vec<Geofence>,
}

#[async_trait]
impl DirectoryStore for FakeDirectory {
    async fn aircraft_by_mac(&self, mac_address: &str) -> Result<Option<Aircraft>> {
        Ok(self.aircraft.get(mac_address).cloned())
    }

    async fn threshold_for(
        &self,
        aircraft_id: i64,
        metric: MetricName,
    ) -> Result<Option<Threshold>> {
        let specific = self
            .thresholds
            .iter()
            .find(|t| t.aircraft_id == Some(aircraft_id) && t.metric_name == metric.as_str());
        if let Some(threshold) = specific {
            return Ok(Some(threshold.clone()));
        }

        Ok(self
            .thresholds
            .iter()
            .find(|t| t.aircraft_id.is_none() && t.is_default && t.metric_name == metric.as_str())
            .cloned())
    }

    async fn active_geofences(&self) -> Result<Vec<Geofence>> {
        Ok(self
            .geofences
            .iter()
            .filter(|g| g.is_active)
            .cloned()
            .collect())
    }
}

/// Time-series writer fake; can be switched into failure mode.
#[derive(Clone, Default)]
pub struct RecordingWriter {
    pub rows: Arc<Mutex<Vec<TelemetryRecord>>>,
    pub fail: Arc<AtomicBool>,
}

impl RecordingWriter {
    pub fn rows(&self) -> Vec<TelemetryRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl TelemetryWriter for RecordingWriter {
    async fn insert(&self, record: &TelemetryRecord) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("time-series store unavailable");
        }
        self.rows.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Feed sink fake recording every published message.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub messages: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<(String, Vec<u8>)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn on_channel(&self, channel: &str) -> Vec<serde_json::Value> {
        self.messages()
            .into_iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, payload)| serde_json::from_slice(&payload).unwrap())
            .collect()
    }
}

#[async_trait]
impl FeedSink for RecordingSink {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((channel.to_string(), payload));
        Ok(())
    }
}

/// Stream source fake that serves scripted batches and records every ack.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    pub batches: Arc<Mutex<VecDeque<Vec<RawEntry>>>>,
    pub acks: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSource {
    pub fn new(batches: Vec<Vec<RawEntry>>) -> Self {
        Self {
            batches: Arc::new(Mutex::new(batches.into_iter().collect())),
            acks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn acks(&self) -> Vec<String> {
        self.acks.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamSource for ScriptedSource {
    async fn ensure_group(&self) -> Result<()> {
        Ok(())
    }

    async fn read_batch(&self, _count: usize) -> Result<Vec<RawEntry>> {
        Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn ack(&self, id: &str) -> Result<()> {
        self.acks.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

pub fn create_test_aircraft(id: i64, mac_address: &str) -> Aircraft {
    Aircraft {
        id,
        mac_address: mac_address.to_string(),
        name: format!("Test Aircraft {id}"),
        current_airport_id: None,
        assigned_pilot_id: None,
        owner_id: 1,
        status: AircraftStatus::Active,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn create_max_threshold(
    aircraft_id: Option<i64>,
    metric: MetricName,
    max_value: f64,
) -> Threshold {
    Threshold {
        id: 0,
        aircraft_id,
        metric_name: metric.as_str().to_string(),
        max_value: Some(max_value),
        min_value: None,
        is_default: aircraft_id.is_none(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn create_test_geofence(name: &str, bounds: (f64, f64, f64, f64), is_active: bool) -> Geofence {
    let (min_latitude, max_latitude, min_longitude, max_longitude) = bounds;
    Geofence {
        id: 0,
        name: name.to_string(),
        description: None,
        min_latitude,
        max_latitude,
        min_longitude,
        max_longitude,
        is_active,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn create_test_telemetry(lat: f64, lon: f64, ground_speed: f64) -> TelemetryInput {
    TelemetryInput {
        timestamp: 1_700_000_000,
        plane_id: TEST_MAC.to_string(),
        latitude: lat,
        longitude: lon,
        altitude: 1000.0,
        ground_speed,
        heading: 90.0,
        climb_rate: 0.0,
    }
}

pub fn create_stream_entry(id: &str, plane_id: &str, telemetry: TelemetryInput) -> StreamEntry {
    StreamEntry {
        id: id.to_string(),
        plane_id: plane_id.to_string(),
        telemetry,
        received_at: Utc::now(),
    }
}

/// A raw broker entry as the ingester would publish it.
pub fn create_raw_entry(id: &str, plane_id: &str, telemetry: &TelemetryInput) -> RawEntry {
    let payload = serde_json::json!({
        "plane_id": plane_id,
        "data_json": serde_json::to_string(telemetry).unwrap(),
        "received_at": "2023-11-14T22:13:25Z",
    });
    RawEntry {
        id: id.to_string(),
        payload: serde_json::to_vec(&payload).unwrap(),
    }
}

pub fn build_processor(
    directory: FakeDirectory,
    writer: RecordingWriter,
    sink: RecordingSink,
) -> TelemetryProcessor<FakeDirectory, RecordingWriter, RecordingSink> {
    let feeds = FeedPublisher::new(sink, GLOBAL_CHANNEL.to_string(), ALERT_CHANNEL.to_string());
    TelemetryProcessor::new(Arc::new(directory), writer, feeds)
}
