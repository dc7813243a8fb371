use std::fmt;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Raw telemetry sample as emitted by the ingestion service.
///
/// Field names follow the upstream wire format. The altitude unit is whatever
/// the transmitter reported; this service treats it as opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryInput {
    /// Sample time in Unix seconds. Zero means the ingester had no clock
    /// reading; the pipeline substitutes the processing time.
    pub timestamp: u64,
    #[serde(rename = "planeId")]
    pub plane_id: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    #[serde(rename = "alt_baro")]
    pub altitude: f64,
    #[serde(rename = "gs")]
    pub ground_speed: f64,
    pub heading: f64,
    pub climb_rate: f64,
}

/// Which checks a telemetry sample violated.
///
/// Core logic carries the tagged variant; the string form exists only at the
/// persistence and publish boundaries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum AnomalyKind {
    #[default]
    None,
    Threshold,
    Geofence,
    Both,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::None => "",
            AnomalyKind::Threshold => "threshold",
            AnomalyKind::Geofence => "geofence",
            AnomalyKind::Both => "both",
        }
    }

    pub fn is_anomalous(&self) -> bool {
        !matches!(self, AnomalyKind::None)
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for AnomalyKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AnomalyKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "" => Ok(AnomalyKind::None),
            "threshold" => Ok(AnomalyKind::Threshold),
            "geofence" => Ok(AnomalyKind::Geofence),
            "both" => Ok(AnomalyKind::Both),
            other => Err(D::Error::custom(format!("unknown anomaly type: {other}"))),
        }
    }
}

/// Result of running a telemetry sample through anomaly detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub has_anomaly: bool,
    #[serde(rename = "anomaly_type")]
    pub kind: AnomalyKind,
    pub details: String,
}

impl Anomaly {
    /// The "nothing detected" result: no flag, no kind, no details.
    pub fn none() -> Self {
        Self {
            has_anomaly: false,
            kind: AnomalyKind::None,
            details: String::new(),
        }
    }
}

/// Processed telemetry row persisted to the time-series store and published
/// on the global feed. Rows are keyed by `(time, aircraft_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::telemetry_data)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TelemetryRecord {
    pub time: DateTime<Utc>,
    pub aircraft_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub ground_speed: f64,
    pub heading: f64,
    pub climb_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub has_anomaly: bool,
    pub anomaly_type: String,
    pub created_at: DateTime<Utc>,
}
