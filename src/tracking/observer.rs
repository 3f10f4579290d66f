use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::geo::{distance_km, estimated_minutes};
use crate::location::GeolocationProvider;
use crate::models::location::GeoPoint;
use crate::models::tracking::{EtaReading, TrackingSample};
use crate::storage::tracking::TrackingRepository;
use crate::tracking::{POLL_INTERVAL, STALE_AFTER};

/// Derives distance, ETA and freshness of `sample` as seen from `observer`.
pub fn eta_reading(sample: TrackingSample, observer: &GeoPoint, now: DateTime<Utc>) -> EtaReading {
    let distance = distance_km(observer, &sample.location);
    let age = now - sample.timestamp;
    let age_seconds = age.num_seconds().max(0);

    let stale = TimeDelta::from_std(STALE_AFTER).is_ok_and(|limit| age > limit);
    let warning = stale.then(|| AppError::StaleSample { age_seconds }.to_string());

    EtaReading {
        appointment_id: sample.appointment_id.clone(),
        distance_km: distance,
        estimated_minutes: estimated_minutes(distance),
        age_seconds,
        stale,
        warning,
        sample,
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ObserverSnapshot {
    pub last_reading: Option<EtaReading>,
    pub last_error: Option<String>,
}

/// The waiting party's view of a journey: reads whatever the travelling party
/// last published and measures it against its own position.
pub struct TrackingObserver {
    repository: TrackingRepository,
    geolocation: Arc<dyn GeolocationProvider>,
}

impl TrackingObserver {
    pub fn new(repository: TrackingRepository, geolocation: Arc<dyn GeolocationProvider>) -> Self {
        Self {
            repository,
            geolocation,
        }
    }

    pub async fn poll_once(&self, appointment_id: &str) -> Result<EtaReading, AppError> {
        let sample = self
            .repository
            .read_sample(appointment_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("no location shared for appointment {appointment_id}"))
            })?;

        let position = self.geolocation.current_position().await?;
        Ok(eta_reading(sample, &position, Utc::now()))
    }

    /// Polls now and then every [`POLL_INTERVAL`] until the handle is dropped.
    pub fn spawn(self: Arc<Self>, appointment_id: String) -> ObserverHandle {
        let (status_tx, status_rx) = watch::channel(ObserverSnapshot::default());

        let task = tokio::spawn(async move {
            let mut ticker = interval(POLL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match self.poll_once(&appointment_id).await {
                    Ok(reading) => {
                        let stale_error = reading.warning.clone();
                        debug!(
                            appointment_id = %appointment_id,
                            distance_km = reading.distance_km,
                            estimated_minutes = reading.estimated_minutes,
                            stale = reading.stale,
                            "eta refreshed"
                        );
                        status_tx.send_modify(|status| {
                            status.last_reading = Some(reading);
                            status.last_error = stale_error;
                        });
                    }
                    Err(err) => {
                        warn!(appointment_id = %appointment_id, error = %err, "eta refresh failed");
                        let message = err.to_string();
                        status_tx.send_modify(|status| status.last_error = Some(message));
                    }
                }
            }
        });

        ObserverHandle { task, status_rx }
    }
}

/// Owns an observer's polling task; dropping it stops the polling.
pub struct ObserverHandle {
    task: JoinHandle<()>,
    status_rx: watch::Receiver<ObserverSnapshot>,
}

impl ObserverHandle {
    pub fn snapshot(&self) -> ObserverSnapshot {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ObserverSnapshot> {
        self.status_rx.clone()
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{DateTime, Duration as ChronoDuration, Utc};

    use super::{eta_reading, TrackingObserver};
    use crate::error::AppError;
    use crate::location::{FixedPosition, GeolocationError, Unavailable};
    use crate::models::location::GeoPoint;
    use crate::models::tracking::TrackingSample;
    use crate::storage::tracking::TrackingRepository;
    use crate::storage::MemoryStore;

    const BARBER: GeoPoint = GeoPoint {
        latitude: 24.7136,
        longitude: 46.6753,
    };

    const CUSTOMER: GeoPoint = GeoPoint {
        latitude: 24.7236,
        longitude: 46.6853,
    };

    fn sample_at(now: DateTime<Utc>, age_seconds: i64) -> TrackingSample {
        TrackingSample {
            appointment_id: "apt-1".to_string(),
            location: BARBER,
            timestamp: now - ChronoDuration::seconds(age_seconds),
        }
    }

    #[test]
    fn reading_carries_distance_and_eta() {
        let now = Utc::now();
        let reading = eta_reading(sample_at(now, 0), &CUSTOMER, now);

        assert!(reading.distance_km > 1.0 && reading.distance_km < 2.0);
        assert_eq!(reading.estimated_minutes, 2);
        assert!(!reading.stale);
    }

    #[test]
    fn samples_older_than_two_intervals_are_stale() {
        let now = Utc::now();
        let fresh = eta_reading(sample_at(now, 20), &CUSTOMER, now);
        let stale = eta_reading(sample_at(now, 21), &CUSTOMER, now);

        assert!(!fresh.stale);
        assert!(fresh.warning.is_none());
        assert!(stale.stale);
        assert_eq!(stale.age_seconds, 21);
        assert!(stale.warning.unwrap().contains("stale"));
    }

    #[test]
    fn fractional_second_past_the_limit_is_stale() {
        let now = Utc::now();
        let sample = TrackingSample {
            appointment_id: "apt-1".to_string(),
            location: BARBER,
            timestamp: now - ChronoDuration::milliseconds(20_900),
        };

        let reading = eta_reading(sample, &CUSTOMER, now);
        assert_eq!(reading.age_seconds, 20);
        assert!(reading.stale);
    }

    #[tokio::test]
    async fn poll_without_sample_is_not_found() {
        let repository = TrackingRepository::new(Arc::new(MemoryStore::new()));
        let observer = TrackingObserver::new(repository, Arc::new(FixedPosition(CUSTOMER)));

        assert!(matches!(
            observer.poll_once("apt-1").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn poll_without_own_position_reports_geolocation_error() {
        let repository = TrackingRepository::new(Arc::new(MemoryStore::new()));
        repository.publish_sample("apt-1", BARBER).await.unwrap();
        let observer = TrackingObserver::new(
            repository,
            Arc::new(Unavailable(GeolocationError::PermissionDenied)),
        );

        assert!(matches!(
            observer.poll_once("apt-1").await,
            Err(AppError::GeolocationUnavailable(GeolocationError::PermissionDenied))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_observer_picks_up_new_samples() {
        let repository = TrackingRepository::new(Arc::new(MemoryStore::new()));
        let observer = Arc::new(TrackingObserver::new(
            repository.clone(),
            Arc::new(FixedPosition(CUSTOMER)),
        ));

        let handle = observer.spawn("apt-1".to_string());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(handle.snapshot().last_reading.is_none());
        assert!(handle.snapshot().last_error.is_some());

        repository.publish_sample("apt-1", BARBER).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let snapshot = handle.snapshot();
        let reading = snapshot.last_reading.unwrap();
        assert_eq!(reading.sample.location, BARBER);
        assert!(snapshot.last_error.is_none());
    }
}
