use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::error::AppError;
use crate::location::GeolocationProvider;
use crate::models::location::GeoPoint;
use crate::models::tracking::{TrackingSample, TrackingState};
use crate::observability::metrics::Metrics;
use crate::storage::tracking::TrackingRepository;
use crate::tracking::POLL_INTERVAL;

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: TrackingState,
    pub last_sample: Option<TrackingSample>,
    pub last_error: Option<String>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: TrackingState::Idle,
            last_sample: None,
            last_error: None,
        }
    }
}

/// Live location sharing for the travelling party of one appointment.
///
/// While active, a background task re-acquires the position every
/// [`POLL_INTERVAL`] and overwrites the appointment's sample. Once
/// [`TrackingSession::stop_tracking`] returns the task is gone; dropping the
/// session signals and aborts it without waiting.
pub struct TrackingSession {
    publisher: Publisher,
    worker: Option<Worker>,
}

struct Worker {
    task: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

#[derive(Clone)]
struct Publisher {
    repository: TrackingRepository,
    geolocation: Arc<dyn GeolocationProvider>,
    events_tx: broadcast::Sender<TrackingSample>,
    status_tx: Arc<watch::Sender<SessionSnapshot>>,
    metrics: Metrics,
    poll_interval: Duration,
}

impl TrackingSession {
    pub fn new(
        repository: TrackingRepository,
        geolocation: Arc<dyn GeolocationProvider>,
        events_tx: broadcast::Sender<TrackingSample>,
        metrics: Metrics,
    ) -> Self {
        let (status_tx, _status_rx) = watch::channel(SessionSnapshot::default());

        Self {
            publisher: Publisher {
                repository,
                geolocation,
                events_tx,
                status_tx: Arc::new(status_tx),
                metrics,
                poll_interval: POLL_INTERVAL,
            },
            worker: None,
        }
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.publisher.poll_interval = poll_interval;
        self
    }

    /// Publishes an immediate fix and starts polling.
    ///
    /// If the first fix cannot be acquired the session stays idle and the
    /// error is recorded in the snapshot; nothing is retried.
    pub async fn start_tracking(
        &mut self,
        appointment_id: impl Into<String>,
    ) -> Result<TrackingSample, AppError> {
        let appointment_id = appointment_id.into();
        self.stop_tracking().await;

        let sample = self.publisher.publish_current(&appointment_id).await?;

        self.publisher.status_tx.send_modify(|status| {
            status.state = TrackingState::Active {
                appointment_id: appointment_id.clone(),
            };
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.publisher.clone().run(appointment_id.clone(), shutdown_rx));
        self.worker = Some(Worker { task, shutdown_tx });
        self.publisher.metrics.active_tracking_sessions.inc();

        info!(appointment_id = %appointment_id, "tracking started");
        Ok(sample)
    }

    /// Cancels the polling task and waits for a tick that is already running
    /// to wind down. Safe to call when already idle.
    pub async fn stop_tracking(&mut self) {
        if let Some(task) = self.halt() {
            let _ = task.await;
        }
    }

    fn halt(&mut self) -> Option<JoinHandle<()>> {
        let worker = self.worker.take()?;

        let _ = worker.shutdown_tx.send(true);
        worker.task.abort();
        self.publisher.metrics.active_tracking_sessions.dec();

        let mut stopped = None;
        self.publisher.status_tx.send_modify(|status| {
            if let TrackingState::Active { appointment_id } = &status.state {
                stopped = Some(appointment_id.clone());
            }
            status.state = TrackingState::Idle;
        });

        if let Some(appointment_id) = stopped {
            info!(appointment_id = %appointment_id, "tracking stopped");
        }

        Some(worker.task)
    }

    pub fn state(&self) -> TrackingState {
        self.publisher.status_tx.borrow().state.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.publisher.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.publisher.status_tx.subscribe()
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        let _ = self.halt();
    }
}

impl Publisher {
    async fn run(self, appointment_id: String, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            // Failures are recorded in the snapshot; the last good sample stays
            // readable and the next tick tries again.
            let Ok(location) = self.acquire_position(&appointment_id).await else {
                continue;
            };

            if *shutdown.borrow() {
                break;
            }

            let _ = self.publish(&appointment_id, location).await;
        }
    }

    async fn publish_current(&self, appointment_id: &str) -> Result<TrackingSample, AppError> {
        let location = self.acquire_position(appointment_id).await?;
        self.publish(appointment_id, location).await
    }

    async fn acquire_position(&self, appointment_id: &str) -> Result<GeoPoint, AppError> {
        match self.geolocation.current_position().await {
            Ok(location) => Ok(location),
            Err(err) => {
                self.metrics.geolocation_failures_total.inc();
                Err(self.record_failure(appointment_id, AppError::from(err)))
            }
        }
    }

    async fn publish(
        &self,
        appointment_id: &str,
        location: GeoPoint,
    ) -> Result<TrackingSample, AppError> {
        let sample = match self.repository.publish_sample(appointment_id, location).await {
            Ok(sample) => sample,
            Err(err) => return Err(self.record_failure(appointment_id, err)),
        };

        self.metrics
            .tracking_samples_total
            .with_label_values(&["success"])
            .inc();
        let _ = self.events_tx.send(sample.clone());
        self.status_tx.send_modify(|status| {
            status.last_sample = Some(sample.clone());
            status.last_error = None;
        });

        Ok(sample)
    }

    fn record_failure(&self, appointment_id: &str, err: AppError) -> AppError {
        self.metrics
            .tracking_samples_total
            .with_label_values(&["error"])
            .inc();
        warn!(appointment_id = %appointment_id, error = %err, "failed to publish tracking sample");

        let message = err.to_string();
        self.status_tx.send_modify(|status| status.last_error = Some(message));
        err
    }
}
