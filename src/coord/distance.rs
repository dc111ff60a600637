//! Great-circle distance between coordinates

use crate::constants::geo::EARTH_RADIUS_METERS;
use crate::coord::{Coordinate, Datum};

/// Calculate the distance between two points in meters (Haversine formula)
///
/// Both points must be in the same datum; the type signature enforces it.
pub fn haversine_distance<D: Datum>(p1: Coordinate<D>, p2: Coordinate<D>) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let delta_lat = (p2.latitude - p1.latitude).to_radians();
    let delta_lng = (p2.longitude - p1.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Check if a point is within `radius_meters` of `center`
pub fn is_within<D: Datum>(point: Coordinate<D>, center: Coordinate<D>, radius_meters: f64) -> bool {
    haversine_distance(point, center) <= radius_meters
}
