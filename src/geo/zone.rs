use tracing::warn;

use crate::geo::distance_km;
use crate::models::barber::{BarberLocation, BarberLocationWithDistance, ServiceZone};
use crate::models::location::GeoPoint;

/// Whether `customer` lies inside the barber's declared zone.
///
/// A barber without a zone is not bookable by distance, so `None` is never
/// within.
pub fn is_within_service_zone(customer: &GeoPoint, zone: Option<&ServiceZone>) -> bool {
    let Some(zone) = zone else {
        return false;
    };

    if !customer.is_valid() || !zone.center.is_valid() || !zone.radius_km.is_finite() {
        return false;
    }

    distance_km(customer, &zone.center) <= zone.radius_km
}

/// Barbers within `max_distance_km` of the customer whose own zone (if any)
/// also covers the customer. Input order is preserved.
pub fn filter_nearby(
    customer: &GeoPoint,
    barbers: &[BarberLocation],
    max_distance_km: f64,
) -> Vec<BarberLocationWithDistance> {
    barbers
        .iter()
        .filter_map(|barber| {
            let location = match barber.location {
                Some(location) if location.is_valid() => location,
                _ => {
                    warn!(barber_id = %barber.barber_id, "skipping barber without usable coordinates");
                    return None;
                }
            };

            let distance = distance_km(customer, &location);
            let within_max = distance <= max_distance_km;
            let within_zone = barber
                .service_zone
                .as_ref()
                .is_none_or(|zone| distance <= zone.radius_km);

            if within_max && within_zone {
                Some(BarberLocationWithDistance {
                    barber: barber.clone(),
                    distance_km: distance,
                })
            } else {
                None
            }
        })
        .collect()
}
