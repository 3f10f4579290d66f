pub mod zone;

use crate::models::location::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Assumed average travel speed for the straight-line ETA.
pub const AVERAGE_SPEED_KMH: f64 = 40.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lng = (b.longitude - a.longitude).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    // Clamped so antipodal rounding noise cannot push asin out of its domain.
    let haversine = (sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng).min(1.0);
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Great-circle distance in kilometers, rounded to one decimal place.
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    round_to_tenth(haversine_km(a, b))
}

/// Straight-line travel time at [`AVERAGE_SPEED_KMH`], in whole minutes.
pub fn estimated_minutes(distance_km: f64) -> u32 {
    if !distance_km.is_finite() || distance_km <= 0.0 {
        return 0;
    }

    (distance_km / AVERAGE_SPEED_KMH * 60.0).round() as u32
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
