use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::rest::barbers::PositionQuery;
use crate::api::rest::ws;
use crate::error::AppError;
use crate::location::SimulatedRoute;
use crate::models::location::GeoPoint;
use crate::models::tracking::{EtaReading, TrackingSample};
use crate::state::AppState;
use crate::tracking::observer::eta_reading;
use crate::tracking::session::{SessionSnapshot, TrackingSession};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/appointments/:id/tracking",
            get(read_sample).put(publish_sample).delete(clear_sample),
        )
        .route("/appointments/:id/tracking/start", post(start_tracking))
        .route("/appointments/:id/tracking/stop", post(stop_tracking))
        .route("/appointments/:id/tracking/session", get(session_snapshot))
        .route("/appointments/:id/eta", get(eta))
        .route("/appointments/:id/ws", get(ws::ws_handler))
}

#[derive(Deserialize)]
pub struct StartTrackingRequest {
    pub barber_id: Uuid,
    pub destination: GeoPoint,
}

#[derive(Deserialize)]
pub struct PublishSampleRequest {
    pub location: GeoPoint,
}

#[derive(Serialize)]
pub struct StopTrackingResponse {
    pub appointment_id: String,
    pub stopped: bool,
}

async fn start_tracking(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<String>,
    Json(payload): Json<StartTrackingRequest>,
) -> Result<Json<TrackingSample>, AppError> {
    let barber = state.barbers.get(payload.barber_id).await?;
    let origin = barber
        .location()
        .filter(GeoPoint::is_valid)
        .ok_or_else(|| {
            AppError::InvalidLocationData(format!("barber {} has no location", barber.id))
        })?;

    if !payload.destination.is_valid() {
        return Err(AppError::InvalidLocationData(
            "destination must be finite".to_string(),
        ));
    }

    if let Some((_, mut previous)) = state.sessions.remove(&appointment_id) {
        previous.stop_tracking().await;
    }

    let route = Arc::new(SimulatedRoute::new(
        origin,
        payload.destination,
        state.simulated_step_fraction,
    ));
    let mut session = TrackingSession::new(
        state.tracking.clone(),
        route,
        state.tracking_events_tx.clone(),
        state.metrics.clone(),
    );

    let sample = session.start_tracking(appointment_id.clone()).await?;
    state.sessions.insert(appointment_id, session);

    Ok(Json(sample))
}

async fn stop_tracking(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<String>,
) -> Json<StopTrackingResponse> {
    let stopped = match state.sessions.remove(&appointment_id) {
        Some((_, mut session)) => {
            session.stop_tracking().await;
            true
        }
        None => false,
    };

    Json(StopTrackingResponse {
        appointment_id,
        stopped,
    })
}

async fn session_snapshot(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<String>,
) -> Json<SessionSnapshot> {
    let snapshot = state
        .sessions
        .get(&appointment_id)
        .map(|session| session.snapshot())
        .unwrap_or_default();
    Json(snapshot)
}

async fn publish_sample(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<String>,
    Json(payload): Json<PublishSampleRequest>,
) -> Result<Json<TrackingSample>, AppError> {
    let sample = state
        .tracking
        .publish_sample(&appointment_id, payload.location)
        .await?;

    state
        .metrics
        .tracking_samples_total
        .with_label_values(&["success"])
        .inc();
    let _ = state.tracking_events_tx.send(sample.clone());

    Ok(Json(sample))
}

async fn read_sample(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<String>,
) -> Result<Json<TrackingSample>, AppError> {
    let sample = state
        .tracking
        .read_sample(&appointment_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("no location shared for appointment {appointment_id}"))
        })?;
    Ok(Json(sample))
}

async fn clear_sample(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<String>,
) -> Result<Json<StopTrackingResponse>, AppError> {
    let stopped = match state.sessions.remove(&appointment_id) {
        Some((_, mut session)) => {
            session.stop_tracking().await;
            true
        }
        None => false,
    };

    state.tracking.clear_sample(&appointment_id).await?;
    info!(appointment_id = %appointment_id, "tracking sample cleared");

    Ok(Json(StopTrackingResponse {
        appointment_id,
        stopped,
    }))
}

async fn eta(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<String>,
    Query(query): Query<PositionQuery>,
) -> Result<Json<EtaReading>, AppError> {
    let observer = query.point()?;
    let sample = state
        .tracking
        .read_sample(&appointment_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("no location shared for appointment {appointment_id}"))
        })?;

    Ok(Json(eta_reading(sample, &observer, Utc::now())))
}
