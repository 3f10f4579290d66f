use std::sync::Arc;
use std::time::Duration;

use barbergo_tracker::api;
use barbergo_tracker::config::Config;
use barbergo_tracker::error::AppError;
use barbergo_tracker::state::AppState;
use barbergo_tracker::storage::{KeyValueStore, LatencyStore, MemoryStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let store: Arc<dyn KeyValueStore> = if config.store_latency_enabled() {
        tracing::info!(
            min_ms = config.store_latency_min_ms,
            max_ms = config.store_latency_max_ms,
            "simulating store latency"
        );
        Arc::new(LatencyStore::new(
            MemoryStore::new(),
            Duration::from_millis(config.store_latency_min_ms),
            Duration::from_millis(config.store_latency_max_ms),
        ))
    } else {
        Arc::new(MemoryStore::new())
    };

    let shared_state = Arc::new(AppState::new(store, &config));
    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    shared_state.sessions.clear();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
