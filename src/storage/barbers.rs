use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::barber::{BarberRecord, ServiceZone};
use crate::models::location::GeoPoint;
use crate::storage::{get_json, set_json, KeyValueStore};

const BARBER_PREFIX: &str = "barber:";

fn barber_key(id: Uuid) -> String {
    format!("{BARBER_PREFIX}{id}")
}

#[derive(Clone)]
pub struct BarberRepository {
    store: Arc<dyn KeyValueStore>,
}

impl BarberRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        owner_id: Uuid,
        name: String,
        location: Option<GeoPoint>,
    ) -> Result<BarberRecord, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("name cannot be empty".to_string()));
        }

        if let Some(point) = location {
            if !point.is_valid() {
                return Err(AppError::InvalidLocationData(
                    "coordinates must be finite".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let record = BarberRecord {
            id: Uuid::new_v4(),
            owner_id,
            name,
            latitude: location.map(|point| point.latitude),
            longitude: location.map(|point| point.longitude),
            service_zone: None,
            created_at: now,
            updated_at: now,
        };

        set_json(self.store.as_ref(), &barber_key(record.id), &record).await?;
        info!(barber_id = %record.id, "barber created");
        Ok(record)
    }

    pub async fn get(&self, id: Uuid) -> Result<BarberRecord, AppError> {
        get_json(self.store.as_ref(), &barber_key(id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("barber {id} not found")))
    }

    /// All decodable barber records, oldest first. Records that fail to
    /// decode are logged and skipped.
    pub async fn list(&self) -> Result<Vec<BarberRecord>, AppError> {
        let keys = self.store.keys_with_prefix(BARBER_PREFIX).await?;

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };

            match serde_json::from_str::<BarberRecord>(&raw) {
                Ok(record) => records.push(record),
                Err(err) => warn!(key = %key, error = %err, "skipping unreadable barber record"),
            }
        }

        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    /// Replaces the barber's service zone. Only the profile owner may do so.
    pub async fn update_service_zone(
        &self,
        barber_id: Uuid,
        acting_user_id: Uuid,
        zone: ServiceZone,
    ) -> Result<BarberRecord, AppError> {
        if !zone.center.is_valid() {
            return Err(AppError::InvalidLocationData(
                "zone center must be finite".to_string(),
            ));
        }

        if !zone.radius_km.is_finite() || zone.radius_km < 0.0 {
            return Err(AppError::BadRequest(
                "radius_km must be a non-negative number".to_string(),
            ));
        }

        let mut record = self.get(barber_id).await?;
        if record.owner_id != acting_user_id {
            warn!(barber_id = %barber_id, acting_user_id = %acting_user_id, "zone update rejected");
            return Err(AppError::Forbidden(format!(
                "user {acting_user_id} does not own barber {barber_id}"
            )));
        }

        record.service_zone = Some(zone);
        record.updated_at = Utc::now();
        set_json(self.store.as_ref(), &barber_key(barber_id), &record).await?;

        info!(barber_id = %barber_id, radius_km = zone.radius_km, "service zone updated");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::BarberRepository;
    use crate::error::AppError;
    use crate::models::barber::ServiceZone;
    use crate::models::location::GeoPoint;
    use crate::storage::{KeyValueStore, MemoryStore};

    fn repo() -> (Arc<MemoryStore>, BarberRepository) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), BarberRepository::new(store))
    }

    fn zone(radius_km: f64) -> ServiceZone {
        ServiceZone {
            center: GeoPoint::new(24.7136, 46.6753),
            radius_km,
        }
    }

    #[tokio::test]
    async fn owner_can_update_zone() {
        let (_store, repo) = repo();
        let owner = Uuid::new_v4();
        let barber = repo
            .create(owner, "Fahad".to_string(), Some(GeoPoint::new(24.7136, 46.6753)))
            .await
            .unwrap();

        let updated = repo.update_service_zone(barber.id, owner, zone(5.0)).await.unwrap();
        assert_eq!(updated.service_zone, Some(zone(5.0)));
        assert_eq!(repo.get(barber.id).await.unwrap().service_zone, Some(zone(5.0)));
    }

    #[tokio::test]
    async fn non_owner_is_forbidden() {
        let (_store, repo) = repo();
        let barber = repo.create(Uuid::new_v4(), "Fahad".to_string(), None).await.unwrap();

        let result = repo
            .update_service_zone(barber.id, Uuid::new_v4(), zone(5.0))
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert_eq!(repo.get(barber.id).await.unwrap().service_zone, None);
    }

    #[tokio::test]
    async fn negative_radius_is_rejected() {
        let (_store, repo) = repo();
        let owner = Uuid::new_v4();
        let barber = repo.create(owner, "Fahad".to_string(), None).await.unwrap();

        let result = repo.update_service_zone(barber.id, owner, zone(-1.0)).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn list_skips_records_with_non_numeric_coordinates() {
        let (store, repo) = repo();
        repo.create(Uuid::new_v4(), "Good".to_string(), Some(GeoPoint::new(24.7, 46.6)))
            .await
            .unwrap();
        store
            .set(
                "barber:broken",
                r#"{"id":"x","latitude":"north","longitude":46.6}"#.to_string(),
            )
            .await
            .unwrap();

        let records = repo.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Good");
    }

    #[tokio::test]
    async fn missing_barber_is_not_found() {
        let (_store, repo) = repo();
        assert!(matches!(
            repo.get(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
