//! In-process trip store used by tests and the simulation driver.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::error::TrackerError;
use crate::geo::Geocoordinate;

use super::{Snapshot, TripRecord, TripStatus, TripStore};

/// Mutexed record map plus a change signal that re-snapshots every
/// subscriber. Each change delivers a full filtered batch, at-least-once;
/// a lagged subscriber coalesces straight to the latest state.
#[derive(Clone)]
pub struct MemoryTripStore {
    records: Arc<Mutex<HashMap<String, TripRecord>>>,
    changed: broadcast::Sender<()>,
}

impl MemoryTripStore {
    pub fn new() -> Self {
        let (changed, _) = broadcast::channel(64);
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            changed,
        }
    }

    fn snapshot_matching(&self, route_name: &str, status: TripStatus) -> Vec<TripRecord> {
        let records = self.records.lock().expect("trip store mutex poisoned");
        let mut matching: Vec<TripRecord> = records
            .values()
            .filter(|r| r.route_name == route_name && r.status == status)
            .cloned()
            .collect();
        // HashMap iteration order is arbitrary; keep snapshots stable.
        matching.sort_by(|a, b| a.trip_id.cmp(&b.trip_id));
        matching
    }

    fn with_record<F>(&self, trip_id: &str, mutate: F) -> Result<(), TrackerError>
    where
        F: FnOnce(&mut TripRecord),
    {
        {
            let mut records = self.records.lock().expect("trip store mutex poisoned");
            let record = records.get_mut(trip_id).ok_or_else(|| {
                TrackerError::Persistence(format!("unknown trip '{trip_id}'"))
            })?;
            mutate(record);
        }
        let _ = self.changed.send(());
        Ok(())
    }
}

impl Default for MemoryTripStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TripStore for MemoryTripStore {
    async fn create(&self, record: TripRecord) -> Result<(), TrackerError> {
        {
            let mut records = self.records.lock().expect("trip store mutex poisoned");
            if records.contains_key(&record.trip_id) {
                return Err(TrackerError::Persistence(format!(
                    "trip '{}' already exists",
                    record.trip_id
                )));
            }
            records.insert(record.trip_id.clone(), record);
        }
        let _ = self.changed.send(());
        Ok(())
    }

    async fn update_position(
        &self,
        trip_id: &str,
        position: Geocoordinate,
        at: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        self.with_record(trip_id, |record| {
            record.position = Some(position);
            record.last_updated = at;
        })
    }

    async fn update_status(
        &self,
        trip_id: &str,
        status: TripStatus,
    ) -> Result<(), TrackerError> {
        if status == TripStatus::Complete {
            return Err(TrackerError::Validation(
                "completion must go through complete() so the end time is written".into(),
            ));
        }
        self.with_record(trip_id, |record| {
            record.status = status;
            record.last_updated = Utc::now();
        })
    }

    async fn complete(&self, trip_id: &str, end_time: DateTime<Utc>) -> Result<(), TrackerError> {
        self.with_record(trip_id, |record| {
            record.status = TripStatus::Complete;
            record.end_time = Some(end_time);
            record.last_updated = end_time;
        })
    }

    async fn get(&self, trip_id: &str) -> Result<Option<TripRecord>, TrackerError> {
        let records = self.records.lock().expect("trip store mutex poisoned");
        Ok(records.get(trip_id).cloned())
    }

    async fn subscribe(&self, route_name: &str, status: TripStatus) -> mpsc::Receiver<Snapshot> {
        let (tx, rx) = mpsc::channel(16);
        let store = self.clone();
        let route_name = route_name.to_string();
        let mut changed = self.changed.subscribe();

        tokio::spawn(async move {
            // Initial snapshot, then one per change signal.
            if tx
                .send(Ok(store.snapshot_matching(&route_name, status)))
                .await
                .is_err()
            {
                return;
            }
            loop {
                match changed.recv().await {
                    Ok(()) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Subscriber lagged, coalescing to latest snapshot");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                if tx
                    .send(Ok(store.snapshot_matching(&route_name, status)))
                    .await
                    .is_err()
                {
                    // Receiver dropped: subscription cancelled.
                    break;
                }
            }
        });

        rx
    }
}
