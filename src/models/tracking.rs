use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::location::GeoPoint;

/// Last known position of the travelling party for one appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackingSample {
    pub appointment_id: String,
    pub location: GeoPoint,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrackingState {
    Idle,
    Active { appointment_id: String },
}

/// Distance and ETA derived by the observing side from a sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtaReading {
    pub appointment_id: String,
    pub sample: TrackingSample,
    pub distance_km: f64,
    pub estimated_minutes: u32,
    pub age_seconds: i64,
    pub stale: bool,
    /// User-facing notice when the reading should not be trusted as current.
    pub warning: Option<String>,
}
