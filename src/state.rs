use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::models::tracking::TrackingSample;
use crate::observability::metrics::Metrics;
use crate::storage::barbers::BarberRepository;
use crate::storage::tracking::TrackingRepository;
use crate::storage::KeyValueStore;
use crate::tracking::session::TrackingSession;

pub struct AppState {
    pub barbers: BarberRepository,
    pub tracking: TrackingRepository,
    /// Server-driven sessions keyed by appointment id.
    pub sessions: DashMap<String, TrackingSession>,
    pub tracking_events_tx: broadcast::Sender<TrackingSample>,
    pub metrics: Metrics,
    pub nearby_max_km: f64,
    pub simulated_step_fraction: f64,
}

impl AppState {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &Config) -> Self {
        let (tracking_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Self {
            barbers: BarberRepository::new(store.clone()),
            tracking: TrackingRepository::new(store),
            sessions: DashMap::new(),
            tracking_events_tx,
            metrics: Metrics::new(),
            nearby_max_km: config.nearby_max_km,
            simulated_step_fraction: config.simulated_step_fraction,
        }
    }
}
