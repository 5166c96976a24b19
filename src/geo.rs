//! Geographic primitives: degree coordinates and great-circle distance.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters, used by the haversine formula.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A (latitude, longitude) pair in degrees.
///
/// Equality is exact coordinate match; there is no tolerance here. Route
/// matching applies its own tolerance on top of raw distances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geocoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Geocoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to `other` in meters (haversine).
    pub fn distance_m(&self, other: &Geocoordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a =
            (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_M * c
    }
}

impl std::fmt::Display for Geocoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}
