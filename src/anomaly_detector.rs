//! Anomaly detection over telemetry samples
//!
//! Two independent checks feed one decision: per-metric thresholds (with
//! global-default fallback) and restricted-area geofences. The composition of
//! their outputs into an [`Anomaly`] is pure; the checks themselves read the
//! directory.

use std::sync::Arc;

use tracing::{error, warn};

use crate::directory::DirectoryStore;
use crate::geofence::Geofence;
use crate::telemetry::{Anomaly, AnomalyKind, TelemetryInput};
use crate::threshold::MetricName;

/// Evaluates the telemetry sample against resolved thresholds.
pub struct ThresholdChecker<D> {
    directory: Arc<D>,
}

impl<D: DirectoryStore> ThresholdChecker<D> {
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }

    /// Violation descriptions for the sample, in metric evaluation order.
    ///
    /// A metric with no resolvable threshold is skipped; a lookup failure on
    /// one metric is logged and does not stop the others.
    pub async fn check(&self, aircraft_id: i64, telemetry: &TelemetryInput) -> Vec<String> {
        let mut violations = Vec::new();

        for metric in MetricName::EVALUATED {
            let Some(value) = metric.sample(telemetry) else {
                continue;
            };

            let threshold = match self.directory.threshold_for(aircraft_id, metric).await {
                Ok(Some(threshold)) => threshold,
                Ok(None) => {
                    warn!(
                        "No threshold defined for metric {} (aircraft {}), skipping",
                        metric, aircraft_id
                    );
                    continue;
                }
                Err(e) => {
                    error!(
                        "Failed to get threshold for metric {} (aircraft {}): {}",
                        metric, aircraft_id, e
                    );
                    continue;
                }
            };

            violations.extend(threshold.violations(metric, value));
        }

        violations
    }
}

/// Evaluates the sample position against all active geofences.
pub struct GeofenceChecker<D> {
    directory: Arc<D>,
}

impl<D: DirectoryStore> GeofenceChecker<D> {
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }

    /// The active geofences containing the point. A directory failure yields
    /// no violations, with a log.
    pub async fn check(&self, lat: f64, lon: f64) -> Vec<Geofence> {
        let geofences = match self.directory.active_geofences().await {
            Ok(geofences) => geofences,
            Err(e) => {
                error!("Failed to load active geofences: {}", e);
                return Vec::new();
            }
        };

        geofences
            .into_iter()
            .filter(|g| g.contains_point(lat, lon))
            .collect()
    }
}

/// Combines the threshold and geofence checks into one decision.
pub struct AnomalyDetector<D> {
    thresholds: ThresholdChecker<D>,
    geofences: GeofenceChecker<D>,
}

impl<D: DirectoryStore> AnomalyDetector<D> {
    pub fn new(directory: Arc<D>) -> Self {
        Self {
            thresholds: ThresholdChecker::new(Arc::clone(&directory)),
            geofences: GeofenceChecker::new(directory),
        }
    }

    pub async fn detect(&self, aircraft_id: i64, telemetry: &TelemetryInput) -> Anomaly {
        let threshold_violations = self.thresholds.check(aircraft_id, telemetry).await;
        let violating_geofences = self
            .geofences
            .check(telemetry.latitude, telemetry.longitude)
            .await;

        compose_anomaly(&threshold_violations, &violating_geofences)
    }
}

/// Pure composition of the evaluator outputs. The first entry of each list is
/// the representative detail; iteration order is fixed upstream.
fn compose_anomaly(threshold_violations: &[String], violating_geofences: &[Geofence]) -> Anomaly {
    match (threshold_violations.first(), violating_geofences.first()) {
        (None, None) => Anomaly::none(),
        (Some(violation), None) => Anomaly {
            has_anomaly: true,
            kind: AnomalyKind::Threshold,
            details: violation.clone(),
        },
        (None, Some(geofence)) => Anomaly {
            has_anomaly: true,
            kind: AnomalyKind::Geofence,
            details: format!("Inside restricted area: {}", geofence.name),
        },
        (Some(violation), Some(geofence)) => Anomaly {
            has_anomaly: true,
            kind: AnomalyKind::Both,
            details: format!(
                "Threshold and geofence violations detected: {} - Inside geofence: {}",
                violation, geofence.name
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn create_test_geofence(name: &str) -> Geofence {
        Geofence {
            id: 1,
            name: name.to_string(),
            description: None,
            min_latitude: 40.5,
            max_latitude: 41.5,
            min_longitude: 28.5,
            max_longitude: 29.5,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn no_violations_is_no_anomaly() {
        let anomaly = compose_anomaly(&[], &[]);
        assert_eq!(anomaly, Anomaly::none());
    }

    #[test]
    fn threshold_only_reports_first_violation() {
        let violations = vec![
            "ground_speed exceeds maximum: 400.00 > 300.00".to_string(),
            "altitude exceeds maximum: 45000.00 > 40000.00".to_string(),
        ];
        let anomaly = compose_anomaly(&violations, &[]);
        assert!(anomaly.has_anomaly);
        assert_eq!(anomaly.kind, AnomalyKind::Threshold);
        assert_eq!(anomaly.details, violations[0]);
    }

    #[test]
    fn geofence_only_names_first_geofence() {
        let geofences = vec![create_test_geofence("NoFlyA"), create_test_geofence("NoFlyB")];
        let anomaly = compose_anomaly(&[], &geofences);
        assert!(anomaly.has_anomaly);
        assert_eq!(anomaly.kind, AnomalyKind::Geofence);
        assert_eq!(anomaly.details, "Inside restricted area: NoFlyA");
    }

    #[test]
    fn both_combines_the_detail_strings() {
        let violations = vec!["ground_speed exceeds maximum: 400.00 > 300.00".to_string()];
        let geofences = vec![create_test_geofence("NoFlyA")];
        let anomaly = compose_anomaly(&violations, &geofences);
        assert!(anomaly.has_anomaly);
        assert_eq!(anomaly.kind, AnomalyKind::Both);
        assert_eq!(
            anomaly.details,
            "Threshold and geofence violations detected: \
             ground_speed exceeds maximum: 400.00 > 300.00 - Inside geofence: NoFlyA"
        );
    }
}
