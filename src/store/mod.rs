//! Trip records and the store contract they live behind.
//!
//! The store is an external collaborator with a narrow surface:
//! create/update by id, get by id, and a filtered standing subscription
//! delivering change batches. The core depends only on this contract,
//! never on a concrete storage technology.

mod memory;

pub use memory::MemoryTripStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::TrackerError;
use crate::geo::Geocoordinate;

/// Occupancy and lifecycle status of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Available,
    Full,
    Complete,
}

impl TripStatus {
    /// Flips available ⇄ full. Complete is terminal and never toggles.
    pub fn toggled(self) -> TripStatus {
        match self {
            TripStatus::Available => TripStatus::Full,
            TripStatus::Full => TripStatus::Available,
            TripStatus::Complete => TripStatus::Complete,
        }
    }
}

/// One vehicle's active or completed service instance on a route.
///
/// Written exclusively by the owning conductor session, read by any number
/// of rider queries. A record is `Complete` if and only if it carries an
/// end time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub trip_id: String,
    pub conductor_id: String,
    pub route_name: String,
    pub matatu_id: String,
    pub status: TripStatus,
    pub position: Option<Geocoordinate>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

impl TripRecord {
    /// True while riders may be matched to this trip.
    pub fn is_matchable(&self) -> bool {
        self.status == TripStatus::Available
    }
}

/// One delivery from a standing subscription: a full batch snapshot of the
/// matching records, or the subscription's own failure.
pub type Snapshot = Result<Vec<TripRecord>, TrackerError>;

/// Narrow contract over whatever document store holds trip records.
#[async_trait]
pub trait TripStore: Send + Sync {
    /// Creates the record; fails if the trip id already exists.
    async fn create(&self, record: TripRecord) -> Result<(), TrackerError>;

    /// Sets position and last-updated on an existing record.
    async fn update_position(
        &self,
        trip_id: &str,
        position: Geocoordinate,
        at: DateTime<Utc>,
    ) -> Result<(), TrackerError>;

    /// Sets occupancy status on an existing record. Rejects `Complete`;
    /// ending a trip goes through [`TripStore::complete`] so the end time
    /// is written with it.
    async fn update_status(&self, trip_id: &str, status: TripStatus)
    -> Result<(), TrackerError>;

    /// Terminally marks the record complete with the given end time.
    async fn complete(&self, trip_id: &str, end_time: DateTime<Utc>) -> Result<(), TrackerError>;

    async fn get(&self, trip_id: &str) -> Result<Option<TripRecord>, TrackerError>;

    /// Standing query for records matching `route_name` with the given
    /// status. Delivers a fresh full snapshot immediately and then on
    /// every relevant change, at-least-once; dropping the receiver ends
    /// the subscription.
    async fn subscribe(&self, route_name: &str, status: TripStatus) -> mpsc::Receiver<Snapshot>;
}
