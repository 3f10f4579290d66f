use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::GeoPoint;

/// Circular area around `center` in which a barber accepts bookings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ServiceZone {
    pub center: GeoPoint,
    pub radius_km: f64,
}

/// Barber profile as persisted under the `barber:` namespace.
///
/// Coordinates are optional because profiles can be created before the barber
/// shares a location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarberRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub service_zone: Option<ServiceZone>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BarberRecord {
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint::new(latitude, longitude)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarberLocation {
    pub barber_id: Uuid,
    pub name: String,
    pub location: Option<GeoPoint>,
    pub service_zone: Option<ServiceZone>,
}

impl From<&BarberRecord> for BarberLocation {
    fn from(record: &BarberRecord) -> Self {
        Self {
            barber_id: record.id,
            name: record.name.clone(),
            location: record.location(),
            service_zone: record.service_zone,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarberLocationWithDistance {
    #[serde(flatten)]
    pub barber: BarberLocation,
    pub distance_km: f64,
}
