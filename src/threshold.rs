//! Threshold models and per-metric violation checks
//!
//! A threshold bounds one metric for one aircraft, or globally when
//! `aircraft_id` is absent (in which case `is_default` must be set).

use std::fmt;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetryInput;

/// Metrics that thresholds can bound.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    GroundSpeed,
    Altitude,
    ClimbRate,
    Heading,
    Temperature,
}

impl MetricName {
    /// Metrics the current telemetry input carries, in the order violations
    /// are evaluated and reported. `Temperature` exists in the domain and the
    /// schema but has no input field, so it is not listed here.
    pub const EVALUATED: [MetricName; 4] = [
        MetricName::GroundSpeed,
        MetricName::Altitude,
        MetricName::ClimbRate,
        MetricName::Heading,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::GroundSpeed => "ground_speed",
            MetricName::Altitude => "altitude",
            MetricName::ClimbRate => "climb_rate",
            MetricName::Heading => "heading",
            MetricName::Temperature => "temperature",
        }
    }

    /// Extract this metric's observed value from a telemetry sample.
    pub fn sample(&self, telemetry: &TelemetryInput) -> Option<f64> {
        match self {
            MetricName::GroundSpeed => Some(telemetry.ground_speed),
            MetricName::Altitude => Some(telemetry.altitude),
            MetricName::ClimbRate => Some(telemetry.climb_rate),
            MetricName::Heading => Some(telemetry.heading),
            MetricName::Temperature => None,
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Min/max bounds for one metric. Either bound may be absent; an absent bound
/// never triggers.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::thresholds)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Threshold {
    pub id: i64,
    /// Absent = global default row.
    pub aircraft_id: Option<i64>,
    pub metric_name: String,
    pub max_value: Option<f64>,
    pub min_value: Option<f64>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Threshold {
    /// Violation descriptions for an observed value. Comparison is strict on
    /// both bounds, and both bounds may trigger independently.
    pub fn violations(&self, metric: MetricName, value: f64) -> Vec<String> {
        let mut violations = Vec::new();
        if let Some(max) = self.max_value
            && value > max
        {
            violations.push(format!(
                "{} exceeds maximum: {:.2} > {:.2}",
                metric, value, max
            ));
        }
        if let Some(min) = self.min_value
            && value < min
        {
            violations.push(format!("{} below minimum: {:.2} < {:.2}", metric, value, min));
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_threshold(min_value: Option<f64>, max_value: Option<f64>) -> Threshold {
        Threshold {
            id: 1,
            aircraft_id: Some(7),
            metric_name: "ground_speed".to_string(),
            max_value,
            min_value,
            is_default: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn max_violation_is_strict() {
        let threshold = create_test_threshold(None, Some(300.0));
        assert!(
            threshold
                .violations(MetricName::GroundSpeed, 300.0)
                .is_empty()
        );
        let violations = threshold.violations(MetricName::GroundSpeed, 400.0);
        assert_eq!(
            violations,
            vec!["ground_speed exceeds maximum: 400.00 > 300.00".to_string()]
        );
    }

    #[test]
    fn min_violation_is_strict() {
        let threshold = create_test_threshold(Some(50.0), None);
        assert!(
            threshold
                .violations(MetricName::GroundSpeed, 50.0)
                .is_empty()
        );
        let violations = threshold.violations(MetricName::GroundSpeed, 49.5);
        assert_eq!(
            violations,
            vec!["ground_speed below minimum: 49.50 < 50.00".to_string()]
        );
    }

    #[test]
    fn absent_bounds_never_trigger() {
        let threshold = create_test_threshold(None, None);
        assert!(
            threshold
                .violations(MetricName::GroundSpeed, f64::MAX)
                .is_empty()
        );
        assert!(
            threshold
                .violations(MetricName::GroundSpeed, f64::MIN)
                .is_empty()
        );
    }

    #[test]
    fn both_bounds_can_trigger_independently() {
        // min above max is nonsensical but exercises both branches at once
        let threshold = create_test_threshold(Some(500.0), Some(300.0));
        let violations = threshold.violations(MetricName::GroundSpeed, 400.0);
        assert_eq!(violations.len(), 2);
        assert!(violations[0].contains("exceeds maximum"));
        assert!(violations[1].contains("below minimum"));
    }

    #[test]
    fn temperature_has_no_input_sample() {
        let telemetry = TelemetryInput {
            timestamp: 1,
            plane_id: "AA:BB:CC:DD:EE:01".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            ground_speed: 0.0,
            heading: 0.0,
            climb_rate: 0.0,
        };
        assert_eq!(MetricName::Temperature.sample(&telemetry), None);
        assert_eq!(MetricName::Altitude.sample(&telemetry), Some(0.0));
    }
}
