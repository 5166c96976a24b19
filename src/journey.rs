//! Walk / ride / walk journey projection over the route network.

use tracing::{debug, warn};

use crate::error::TrackerError;
use crate::geo::Geocoordinate;
use crate::network::{NearestStopFinder, RouteNetwork, SegmentExtractor};

/// A rider journey projected onto the network, or the direct-path fallback
/// when no usable ride segment exists.
#[derive(Debug, Clone, PartialEq)]
pub enum JourneyPlan {
    /// Walk to `board`, ride through `waypoints` to `alight`, walk on to
    /// the destination. `waypoints` may be empty for adjacent stops.
    Multimodal {
        start: Geocoordinate,
        board: Geocoordinate,
        waypoints: Vec<Geocoordinate>,
        alight: Geocoordinate,
        destination: Geocoordinate,
    },
    /// No matching ride segment; render a direct path and hide
    /// ride-specific affordances.
    Direct {
        start: Geocoordinate,
        destination: Geocoordinate,
    },
}

impl JourneyPlan {
    /// The full ride polyline including boarding and alighting stops;
    /// empty for a direct plan.
    pub fn ride_points(&self) -> Vec<Geocoordinate> {
        match self {
            JourneyPlan::Multimodal {
                board,
                waypoints,
                alight,
                ..
            } => {
                let mut points = Vec::with_capacity(waypoints.len() + 2);
                points.push(*board);
                points.extend_from_slice(waypoints);
                points.push(*alight);
                points
            }
            JourneyPlan::Direct { .. } => Vec::new(),
        }
    }

    /// Ordered hand-off points for an external navigation app: start,
    /// boarding stop, alighting stop, destination.
    pub fn navigation_waypoints(&self) -> Vec<Geocoordinate> {
        match self {
            JourneyPlan::Multimodal {
                start,
                board,
                alight,
                destination,
                ..
            } => vec![*start, *board, *alight, *destination],
            JourneyPlan::Direct { start, destination } => vec![*start, *destination],
        }
    }
}

/// Projects rider journeys onto a borrowed route network.
pub struct JourneyPlanner<'a> {
    network: &'a RouteNetwork,
}

impl<'a> JourneyPlanner<'a> {
    pub fn new(network: &'a RouteNetwork) -> Self {
        Self { network }
    }

    /// Projects `start → destination` onto the network.
    ///
    /// Fails with `NotFound` only when the network has no stops at all.
    /// When the matched stops are not served by a single route, or both
    /// endpoints snap to the same stop, the direct-path fallback is
    /// returned instead; that is a recognized condition, not a fault.
    pub fn plan(
        &self,
        start: Geocoordinate,
        destination: Geocoordinate,
    ) -> Result<JourneyPlan, TrackerError> {
        let finder = NearestStopFinder::new(self.network);
        let board = finder.nearest(start)?;
        let alight = finder.nearest(destination)?;

        let extractor = SegmentExtractor::new(self.network);
        if extractor.route_containing(board, alight).is_none() {
            warn!("No single route serves both stops, falling back to direct path");
            return Ok(JourneyPlan::Direct { start, destination });
        }
        if board == alight {
            debug!("Both endpoints snap to one stop, nothing to ride");
            return Ok(JourneyPlan::Direct { start, destination });
        }

        let waypoints = extractor.waypoints_between(board, alight);
        debug!(waypoints = waypoints.len(), "Journey projected onto network");
        Ok(JourneyPlan::Multimodal {
            start,
            board,
            waypoints,
            alight,
            destination,
        })
    }
}
