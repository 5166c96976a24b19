//! Nearest-stop lookup and ride segment extraction.

use crate::error::TrackerError;
use crate::geo::Geocoordinate;

use super::{RouteDefinition, RouteNetwork};

/// Maximum great-circle distance, in meters, for treating two coordinates
/// as the same stop when matching against a route. Absorbs the noise
/// between a nearest-stop result and the stop literally stored in a route.
pub const MATCH_TOLERANCE_M: f64 = 100.0;

/// Resolves arbitrary coordinates to the closest registered stop.
pub struct NearestStopFinder<'a> {
    network: &'a RouteNetwork,
}

impl<'a> NearestStopFinder<'a> {
    pub fn new(network: &'a RouteNetwork) -> Self {
        Self { network }
    }

    /// The stop minimizing great-circle distance to `point`.
    ///
    /// Ties keep the first-encountered stop. Linear scan over the stop
    /// index; stop counts are tens, not millions.
    pub fn nearest(&self, point: Geocoordinate) -> Result<Geocoordinate, TrackerError> {
        let mut nearest = None;
        let mut min_distance = f64::MAX;

        for stop in self.network.stops() {
            let distance = point.distance_m(stop);
            if distance < min_distance {
                min_distance = distance;
                nearest = Some(*stop);
            }
        }

        nearest.ok_or_else(|| TrackerError::NotFound("no stops registered".into()))
    }
}

/// Extracts the ride portion of a journey from a route serving both
/// endpoints.
pub struct SegmentExtractor<'a> {
    network: &'a RouteNetwork,
}

impl<'a> SegmentExtractor<'a> {
    pub fn new(network: &'a RouteNetwork) -> Self {
        Self { network }
    }

    /// The first route in registration order with some stop within
    /// tolerance of `a` and some stop within tolerance of `b`.
    pub fn route_containing(
        &self,
        a: Geocoordinate,
        b: Geocoordinate,
    ) -> Option<&'a RouteDefinition> {
        self.network.routes().iter().find(|route| {
            let mut has_a = false;
            let mut has_b = false;
            for stop in &route.stops {
                if a.distance_m(stop) < MATCH_TOLERANCE_M {
                    has_a = true;
                }
                if b.distance_m(stop) < MATCH_TOLERANCE_M {
                    has_b = true;
                }
            }
            has_a && has_b
        })
    }

    /// The stops strictly between the matched boarding and alighting
    /// indices, in route order.
    ///
    /// When several stops fall within tolerance the last matching index
    /// wins, favoring the furthest-along candidate. Anything short of
    /// `start < end` yields an empty list: no intermediate waypoints, not
    /// an error, and the route and endpoints may still exist.
    pub fn waypoints_between(&self, a: Geocoordinate, b: Geocoordinate) -> Vec<Geocoordinate> {
        let Some(route) = self.route_containing(a, b) else {
            return Vec::new();
        };
        if route.stops.len() < 2 {
            return Vec::new();
        }

        let mut start_index = None;
        let mut end_index = None;
        for (i, stop) in route.stops.iter().enumerate() {
            if a.distance_m(stop) < MATCH_TOLERANCE_M {
                start_index = Some(i);
            }
            if b.distance_m(stop) < MATCH_TOLERANCE_M {
                end_index = Some(i);
            }
        }

        match (start_index, end_index) {
            (Some(start), Some(end)) if start < end => route.stops[start + 1..end].to_vec(),
            _ => Vec::new(),
        }
    }
}
