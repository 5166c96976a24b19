//! Rider-side live tracking and ETA estimation.
//!
//! A standing filtered subscription over trip records drives a pure
//! recomputation of distance and time-to-arrival on every change
//! delivery. Deliveries are independent snapshots, so duplicates or
//! reordering from the underlying at-least-once channel cannot corrupt
//! anything.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::geo::Geocoordinate;
use crate::store::{TripRecord, TripStatus, TripStore};

/// Average matatu pace over mixed walk/ride/traffic: 20 km/h in m/s.
pub const AVERAGE_SPEED_MPS: f64 = 5.55;

/// Distance and time-to-arrival for one available matatu.
#[derive(Debug, Clone, PartialEq)]
pub struct EtaEstimate {
    pub matatu_id: String,
    pub distance_m: f64,
    pub eta_minutes: u32,
}

/// One delivery of the live tracking stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingUpdate {
    /// Estimates for every available matatu with a known position.
    /// Records still missing a position are excluded, so this can be an
    /// empty list while matatus exist.
    Matches(Vec<EtaEstimate>),
    /// The qualifying set is empty: nobody is available right now.
    NoMatches,
    /// The subscription itself failed: we could not ask.
    TransportError(String),
}

/// Recomputes rider ETAs on every store change notification.
pub struct LiveTracker {
    store: Arc<dyn TripStore>,
}

impl LiveTracker {
    pub fn new(store: Arc<dyn TripStore>) -> Self {
        Self { store }
    }

    /// Standing ETA stream for all available trips on `route_name`.
    ///
    /// Dropping the receiver cancels the stream; nothing is delivered
    /// after that.
    pub async fn track(
        &self,
        rider: Geocoordinate,
        route_name: &str,
    ) -> mpsc::Receiver<TrackingUpdate> {
        let (tx, rx) = mpsc::channel(16);
        let mut snapshots = self.store.subscribe(route_name, TripStatus::Available).await;
        let route = route_name.to_string();

        tokio::spawn(async move {
            info!(route = %route, "Matatu tracking started");
            while let Some(snapshot) = snapshots.recv().await {
                let update = match snapshot {
                    Ok(records) if records.is_empty() => TrackingUpdate::NoMatches,
                    Ok(records) => TrackingUpdate::Matches(estimate_all(rider, &records)),
                    Err(e) => {
                        error!(route = %route, error = %e, "Matatu tracking subscription failed");
                        TrackingUpdate::TransportError(e.to_string())
                    }
                };
                if tx.send(update).await.is_err() {
                    // Caller stopped tracking.
                    break;
                }
            }
            debug!(route = %route, "Matatu tracking stopped");
        });

        rx
    }
}

/// Pure recomputation over one snapshot. Records without a position are
/// skipped rather than erroring the stream.
fn estimate_all(rider: Geocoordinate, records: &[TripRecord]) -> Vec<EtaEstimate> {
    records
        .iter()
        .filter_map(|record| {
            let position = record.position?;
            let distance_m = rider.distance_m(&position);
            Some(EtaEstimate {
                matatu_id: record.matatu_id.clone(),
                distance_m,
                eta_minutes: eta_minutes(distance_m),
            })
        })
        .collect()
}

/// Ceiling minutes to cover `distance_m` at the fixed average speed. Any
/// nonzero distance costs at least one minute.
pub fn eta_minutes(distance_m: f64) -> u32 {
    (distance_m / AVERAGE_SPEED_MPS / 60.0).ceil() as u32
}
