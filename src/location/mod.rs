use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position unavailable")]
    PositionUnavailable,
}

/// Source of the device's current position.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<GeoPoint, GeolocationError>;
}

/// Always reports the same position.
pub struct FixedPosition(pub GeoPoint);

#[async_trait]
impl GeolocationProvider for FixedPosition {
    async fn current_position(&self) -> Result<GeoPoint, GeolocationError> {
        Ok(self.0)
    }
}

/// Provider for a device that refuses to share its position.
pub struct Unavailable(pub GeolocationError);

#[async_trait]
impl GeolocationProvider for Unavailable {
    async fn current_position(&self) -> Result<GeoPoint, GeolocationError> {
        Err(self.0)
    }
}

/// Moves a simulated traveller from `origin` toward `destination`, covering
/// `step_fraction` of the remaining straight line on every fix.
pub struct SimulatedRoute {
    position: Mutex<GeoPoint>,
    destination: GeoPoint,
    step_fraction: f64,
}

impl SimulatedRoute {
    pub fn new(origin: GeoPoint, destination: GeoPoint, step_fraction: f64) -> Self {
        Self {
            position: Mutex::new(origin),
            destination,
            step_fraction: if step_fraction.is_finite() {
                step_fraction.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }
}

#[async_trait]
impl GeolocationProvider for SimulatedRoute {
    async fn current_position(&self) -> Result<GeoPoint, GeolocationError> {
        let mut position = self.position.lock().await;
        let current = *position;

        if !current.is_valid() || !self.destination.is_valid() {
            return Err(GeolocationError::PositionUnavailable);
        }

        *position = GeoPoint::new(
            current.latitude + (self.destination.latitude - current.latitude) * self.step_fraction,
            current.longitude
                + (self.destination.longitude - current.longitude) * self.step_fraction,
        );

        Ok(current)
    }
}
