//! Great-circle distance and nearest-point lookup.
//!
//! The lookup is a plain linear scan over every candidate; callers pass in
//! the full set of charge points.

use crate::error::{ChargemapError, Result};
use crate::types::ChargePoint;

/// Mean earth diameter in kilometres (2 * 6371).
pub const EARTH_DIAMETER_KM: f64 = 12_742.0;

/// Haversine distance between two points given in degrees, in kilometres.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let p = std::f64::consts::PI / 180.0;
    let hav = 0.5 - ((lat2 - lat1) * p).cos() / 2.0
        + (lat1 * p).cos() * (lat2 * p).cos() * (1.0 - ((lng2 - lng1) * p).cos()) / 2.0;
    // Rounding can push hav a hair outside [0, 1] for antipodal points.
    EARTH_DIAMETER_KM * hav.clamp(0.0, 1.0).sqrt().asin()
}

pub fn validate_latitude(lat: f64) -> Result<()> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(ChargemapError::Validation(format!(
            "lat must be between -90 and 90, got {}",
            lat
        )));
    }
    Ok(())
}

pub fn validate_longitude(lng: f64) -> Result<()> {
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(ChargemapError::Validation(format!(
            "lng must be between -180 and 180, got {}",
            lng
        )));
    }
    Ok(())
}

/// Check that a latitude/longitude pair lies on the globe.
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<()> {
    validate_latitude(lat)?;
    validate_longitude(lng)
}

/// Return the point closest to `(lat, lng)`.
///
/// Ties keep the earliest point in iteration order. `None` for an empty input.
pub fn nearest<'a, I>(points: I, lat: f64, lng: f64) -> Option<&'a ChargePoint>
where
    I: IntoIterator<Item = &'a ChargePoint>,
{
    let mut best: Option<(&ChargePoint, f64)> = None;
    for point in points {
        let distance = haversine_km(point.lat, point.lng, lat, lng);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((point, distance)),
        }
    }
    best.map(|(point, _)| point)
}
