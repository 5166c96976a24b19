//! Simulation-only providers for the CLI driver.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use matatu_tracker::error::TrackerError;
use matatu_tracker::geo::Geocoordinate;
use matatu_tracker::providers::LocationProvider;

/// Replays a route's stops as successive position fixes, holding the last
/// stop once the run is exhausted.
pub struct RoutePlayback {
    stops: Vec<Geocoordinate>,
    cursor: AtomicUsize,
}

impl RoutePlayback {
    pub fn new(stops: Vec<Geocoordinate>) -> Self {
        Self {
            stops,
            cursor: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LocationProvider for RoutePlayback {
    async fn last_known(&self) -> Result<Option<Geocoordinate>, TrackerError> {
        if self.stops.is_empty() {
            return Ok(None);
        }
        let i = self
            .cursor
            .fetch_add(1, Ordering::Relaxed)
            .min(self.stops.len() - 1);
        Ok(Some(self.stops[i]))
    }
}
