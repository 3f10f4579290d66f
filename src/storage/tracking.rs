use std::sync::Arc;

use chrono::Utc;

use crate::error::AppError;
use crate::models::location::GeoPoint;
use crate::models::tracking::TrackingSample;
use crate::storage::{get_json, set_json, KeyValueStore};

const TRACKING_PREFIX: &str = "tracking:";

fn tracking_key(appointment_id: &str) -> String {
    format!("{TRACKING_PREFIX}{appointment_id}")
}

/// Latest-position records, one per appointment.
#[derive(Clone)]
pub struct TrackingRepository {
    store: Arc<dyn KeyValueStore>,
}

impl TrackingRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stores `location` as the appointment's current sample, replacing any
    /// earlier one.
    pub async fn publish_sample(
        &self,
        appointment_id: &str,
        location: GeoPoint,
    ) -> Result<TrackingSample, AppError> {
        if appointment_id.trim().is_empty() {
            return Err(AppError::BadRequest(
                "appointment id cannot be empty".to_string(),
            ));
        }

        if !location.is_valid() {
            return Err(AppError::InvalidLocationData(
                "coordinates must be finite".to_string(),
            ));
        }

        let sample = TrackingSample {
            appointment_id: appointment_id.to_string(),
            location,
            timestamp: Utc::now(),
        };

        set_json(self.store.as_ref(), &tracking_key(appointment_id), &sample).await?;
        Ok(sample)
    }

    pub async fn read_sample(&self, appointment_id: &str) -> Result<Option<TrackingSample>, AppError> {
        get_json(self.store.as_ref(), &tracking_key(appointment_id)).await
    }

    pub async fn clear_sample(&self, appointment_id: &str) -> Result<(), AppError> {
        self.store.remove(&tracking_key(appointment_id)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::TrackingRepository;
    use crate::error::AppError;
    use crate::models::location::GeoPoint;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn second_publish_replaces_first() {
        let store = Arc::new(MemoryStore::new());
        let repo = TrackingRepository::new(store.clone());

        repo.publish_sample("apt-1", GeoPoint::new(24.71, 46.67)).await.unwrap();
        repo.publish_sample("apt-1", GeoPoint::new(24.72, 46.68)).await.unwrap();

        let sample = repo.read_sample("apt-1").await.unwrap().unwrap();
        assert_eq!(sample.location, GeoPoint::new(24.72, 46.68));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn samples_are_isolated_per_appointment() {
        let repo = TrackingRepository::new(Arc::new(MemoryStore::new()));

        repo.publish_sample("apt-1", GeoPoint::new(24.71, 46.67)).await.unwrap();

        assert!(repo.read_sample("apt-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_removes_sample() {
        let repo = TrackingRepository::new(Arc::new(MemoryStore::new()));

        repo.publish_sample("apt-1", GeoPoint::new(24.71, 46.67)).await.unwrap();
        repo.clear_sample("apt-1").await.unwrap();

        assert!(repo.read_sample("apt-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_coordinates_are_rejected() {
        let repo = TrackingRepository::new(Arc::new(MemoryStore::new()));

        let result = repo.publish_sample("apt-1", GeoPoint::new(f64::INFINITY, 46.67)).await;
        assert!(matches!(result, Err(AppError::InvalidLocationData(_))));
    }
}
