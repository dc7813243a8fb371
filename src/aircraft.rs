use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};

/// Operational status of an aircraft.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, DbEnum, Serialize, Deserialize)]
#[ExistingTypePath = "crate::schema::sql_types::AircraftStatus"]
#[serde(rename_all = "lowercase")]
pub enum AircraftStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
}

/// An aircraft registered with the platform. Stream entries carry the MAC
/// address of the onboard transmitter; everything downstream references the
/// surrogate id.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::aircraft)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Aircraft {
    pub id: i64,
    pub mac_address: String,
    pub name: String,
    pub current_airport_id: Option<i64>,
    pub assigned_pilot_id: Option<i64>,
    pub owner_id: i64,
    pub status: AircraftStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
