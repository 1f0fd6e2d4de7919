//! Great-circle distance between coordinates.

use crate::models::GeoPoint;

/// Earth radius used for every distance in this crate (meters)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters.
///
/// Symmetric and zero for identical points. Callers filter out points
/// without coordinates beforehand.
pub fn haversine(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lon - a.lon).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push h a hair outside [0, 1]
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Earth-centred cartesian position (meters) on the same sphere.
///
/// The straight-line distance between two projected points never exceeds
/// their haversine distance, which is what lets the spatial index use it as
/// a conservative prefilter.
pub fn to_ecef(p: &GeoPoint) -> [f64; 3] {
    let phi = p.lat.to_radians();
    let lambda = p.lon.to_radians();
    [
        EARTH_RADIUS_M * phi.cos() * lambda.cos(),
        EARTH_RADIUS_M * phi.cos() * lambda.sin(),
        EARTH_RADIUS_M * phi.sin(),
    ]
}
