use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post, put};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::distance_km;
use crate::geo::zone::{filter_nearby, is_within_service_zone};
use crate::models::barber::{BarberLocation, BarberLocationWithDistance, BarberRecord, ServiceZone};
use crate::models::location::GeoPoint;
use crate::state::AppState;

/// Identifies the acting user. Authentication itself happens upstream.
pub const USER_ID_HEADER: &str = "x-user-id";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/barbers", post(create_barber).get(list_barbers))
        .route("/barbers/nearby", get(nearby_barbers))
        .route("/barbers/:id", get(get_barber))
        .route("/barbers/:id/zone", put(update_zone))
        .route("/barbers/:id/zone/contains", get(zone_contains))
}

#[derive(Deserialize)]
pub struct CreateBarberRequest {
    pub name: String,
    pub location: Option<GeoPoint>,
}

#[derive(Deserialize)]
pub struct PositionQuery {
    pub lat: f64,
    pub lng: f64,
}

impl PositionQuery {
    pub fn point(&self) -> Result<GeoPoint, AppError> {
        let point = GeoPoint::new(self.lat, self.lng);
        if point.is_valid() {
            Ok(point)
        } else {
            Err(AppError::InvalidLocationData(
                "lat and lng must be finite".to_string(),
            ))
        }
    }
}

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    pub max_km: Option<f64>,
}

#[derive(Serialize)]
pub struct ZoneCheckResponse {
    pub barber_id: Uuid,
    pub within: bool,
    pub distance_km: Option<f64>,
}

fn acting_user(headers: &HeaderMap) -> Result<Uuid, AppError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| AppError::BadRequest(format!("missing {USER_ID_HEADER} header")))?;

    raw.to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .ok_or_else(|| AppError::BadRequest(format!("{USER_ID_HEADER} must be a uuid")))
}

async fn create_barber(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateBarberRequest>,
) -> Result<Json<BarberRecord>, AppError> {
    let owner_id = acting_user(&headers)?;
    let record = state
        .barbers
        .create(owner_id, payload.name, payload.location)
        .await?;
    Ok(Json(record))
}

async fn list_barbers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BarberRecord>>, AppError> {
    Ok(Json(state.barbers.list().await?))
}

async fn get_barber(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<BarberRecord>, AppError> {
    Ok(Json(state.barbers.get(id).await?))
}

async fn nearby_barbers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<BarberLocationWithDistance>>, AppError> {
    let customer = PositionQuery {
        lat: query.lat,
        lng: query.lng,
    }
    .point()?;

    let max_distance_km = query.max_km.unwrap_or(state.nearby_max_km);
    if !max_distance_km.is_finite() || max_distance_km < 0.0 {
        return Err(AppError::BadRequest(
            "max_km must be a non-negative number".to_string(),
        ));
    }

    let barbers: Vec<BarberLocation> = state
        .barbers
        .list()
        .await?
        .iter()
        .map(BarberLocation::from)
        .collect();

    state.metrics.nearby_queries_total.inc();
    Ok(Json(filter_nearby(&customer, &barbers, max_distance_km)))
}

async fn update_zone(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(zone): Json<ServiceZone>,
) -> Result<Json<BarberRecord>, AppError> {
    let acting_user_id = acting_user(&headers)?;
    let record = state
        .barbers
        .update_service_zone(id, acting_user_id, zone)
        .await?;
    Ok(Json(record))
}

async fn zone_contains(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<PositionQuery>,
) -> Result<Json<ZoneCheckResponse>, AppError> {
    let customer = query.point()?;
    let barber = state.barbers.get(id).await?;

    Ok(Json(ZoneCheckResponse {
        barber_id: barber.id,
        within: is_within_service_zone(&customer, barber.service_zone.as_ref()),
        distance_km: barber
            .service_zone
            .map(|zone| distance_km(&customer, &zone.center)),
    }))
}
