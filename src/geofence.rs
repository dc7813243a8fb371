//! Geofence models and containment checks
//!
//! Geofences are axis-aligned latitude/longitude rectangles marking restricted
//! areas. A telemetry sample inside any active geofence is anomalous.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// A restricted-area rectangle. Invariant: `min <= max` on both axes.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::geofences)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Geofence {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Geofence {
    /// Check if a point (lat, lon) is inside the rectangle.
    ///
    /// All four bounds are inclusive. An inactive geofence contains nothing.
    pub fn contains_point(&self, lat: f64, lon: f64) -> bool {
        if !self.is_active {
            return false;
        }
        lat >= self.min_latitude
            && lat <= self.max_latitude
            && lon >= self.min_longitude
            && lon <= self.max_longitude
    }
}
