//! Great-circle distance.

use geo::Point;

/// Sphere radius used for every guidance distance, in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two points (x = lon, y = lat), in kilometers
pub fn haversine_km(a: Point<f64>, b: Point<f64>) -> f64 {
    let phi1 = a.y().to_radians();
    let phi2 = b.y().to_radians();
    let d_phi = (b.y() - a.y()).to_radians();
    let d_lambda = (b.x() - a.x()).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c / 1000.0
}
