//! The static route network: named, ordered stop sequences and the
//! deduplicated stop index derived from them.
//!
//! Built once at startup and treated as immutable afterwards; rider-side
//! queries borrow it.

mod catalog;
mod search;

pub use search::{MATCH_TOLERANCE_M, NearestStopFinder, SegmentExtractor};

use tracing::debug;

use crate::error::TrackerError;
use crate::geo::Geocoordinate;

/// A named matatu line: an ordered stop sequence whose insertion order is
/// the direction of travel.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDefinition {
    pub name: String,
    pub stops: Vec<Geocoordinate>,
}

/// All registered routes plus the flattened set of distinct stops.
#[derive(Debug, Default)]
pub struct RouteNetwork {
    routes: Vec<RouteDefinition>,
    stop_index: Vec<Geocoordinate>,
}

impl RouteNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route, replacing any existing route with the same name,
    /// and rebuilds the stop index.
    pub fn add_route(
        &mut self,
        name: &str,
        stops: Vec<Geocoordinate>,
    ) -> Result<(), TrackerError> {
        if stops.is_empty() {
            return Err(TrackerError::Validation(format!(
                "route '{name}' has no stops"
            )));
        }

        match self.routes.iter_mut().find(|r| r.name == name) {
            Some(existing) => existing.stops = stops,
            None => self.routes.push(RouteDefinition {
                name: name.to_string(),
                stops,
            }),
        }
        self.rebuild_stop_index();

        debug!(
            route = name,
            total_routes = self.routes.len(),
            total_stops = self.stop_index.len(),
            "Route registered"
        );
        Ok(())
    }

    /// All distinct stops across all routes, in first-encountered order.
    pub fn stops(&self) -> &[Geocoordinate] {
        &self.stop_index
    }

    /// Routes in registration order.
    pub fn routes(&self) -> &[RouteDefinition] {
        &self.routes
    }

    pub fn route(&self, name: &str) -> Option<&RouteDefinition> {
        self.routes.iter().find(|r| r.name == name)
    }

    // Deduplication is exact coordinate equality: the same physical stop
    // with different floating-point provenance stays distinct.
    fn rebuild_stop_index(&mut self) {
        self.stop_index.clear();
        for route in &self.routes {
            for stop in &route.stops {
                if !self.stop_index.contains(stop) {
                    self.stop_index.push(*stop);
                }
            }
        }
    }

    /// The built-in Nairobi network: the Roysambu and Rongai lines.
    pub fn nairobi_default() -> Self {
        let mut network = Self::new();
        network
            .add_route(
                "Roysambu to Nairobi Town",
                vec![
                    Geocoordinate::new(-1.22039, 23.89101), // Roysambu
                    Geocoordinate::new(-1.22593, 36.88504), // Safari Park Hotel
                    Geocoordinate::new(-1.23038, 36.87896), // Garden City Mall
                    Geocoordinate::new(-1.23456, 36.87397), // Mountain Mall
                    Geocoordinate::new(-1.24411, 36.86805), // AllSops
                    Geocoordinate::new(-1.24872, 36.86352), // Drive In
                    Geocoordinate::new(-1.25338, 36.85902), // KCA University
                    Geocoordinate::new(-1.26038, 36.84358), // Muthaiga
                    Geocoordinate::new(-1.26399, 36.83721), // Pangani
                    Geocoordinate::new(-1.27465, 36.82437), // Ngara
                    Geocoordinate::new(-1.28329, 36.82475), // Odeon (Nairobi Town)
                ],
            )
            .expect("built-in route is nonempty");
        network
            .add_route(
                "CBD to Rongai",
                vec![
                    Geocoordinate::new(-1.2889, 36.8208), // CBD
                    Geocoordinate::new(-1.3000, 36.8150), // Lang'ata
                    Geocoordinate::new(-1.3200, 36.7900), // Galleria
                    Geocoordinate::new(-1.3500, 36.7700), // Kiserian Road
                    Geocoordinate::new(-1.3800, 36.7600), // Rongai
                ],
            )
            .expect("built-in route is nonempty");
        network
    }
}
