//! Conductor-side trip session: the state machine that gates position and
//! status publication.
//!
//! A session owns at most one active trip. Starting a trip creates the
//! record and spawns the periodic position publisher; ending it cancels
//! the publisher, terminally completes the record, and re-arms the session
//! for reuse.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::TrackerError;
use crate::providers::{ForegroundHost, IdentityProvider, LocationProvider};
use crate::store::{TripRecord, TripStatus, TripStore};

/// Nominal spacing between position reports.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Where the session currently is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active { trip_id: String, status: TripStatus },
}

/// A conductor's publishing context: at most one active trip at a time,
/// restartable after `end_trip`.
pub struct TripSession {
    store: Arc<dyn TripStore>,
    location: Arc<dyn LocationProvider>,
    identity: Arc<dyn IdentityProvider>,
    foreground: Arc<dyn ForegroundHost>,
    report_interval: Duration,
    state: SessionState,
    publisher: Option<JoinHandle<()>>,
}

impl TripSession {
    pub fn new(
        store: Arc<dyn TripStore>,
        location: Arc<dyn LocationProvider>,
        identity: Arc<dyn IdentityProvider>,
        foreground: Arc<dyn ForegroundHost>,
    ) -> Self {
        Self {
            store,
            location,
            identity,
            foreground,
            report_interval: REPORT_INTERVAL,
            state: SessionState::Idle,
            publisher: None,
        }
    }

    /// Overrides the nominal report interval, for simulations and tests.
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active { .. })
    }

    /// Starts a new trip and begins periodic position publication.
    ///
    /// Returns the generated trip id. Requires a signed-in operator; a
    /// re-entrant start is rejected without touching the active trip. A
    /// failed record create leaves the session idle with nothing running.
    pub async fn start_trip(
        &mut self,
        route_name: &str,
        matatu_id: &str,
    ) -> Result<String, TrackerError> {
        if let SessionState::Active { trip_id, .. } = &self.state {
            warn!(trip_id = %trip_id, "Trip already active, ignoring start");
            return Err(TrackerError::Validation("a trip is already active".into()));
        }
        let Some(conductor_id) = self.identity.current_operator() else {
            return Err(TrackerError::Validation(
                "no operator signed in, cannot start a trip".into(),
            ));
        };

        let trip_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let record = TripRecord {
            trip_id: trip_id.clone(),
            conductor_id: conductor_id.clone(),
            route_name: route_name.to_string(),
            matatu_id: matatu_id.to_string(),
            status: TripStatus::Available,
            position: None,
            start_time: now,
            end_time: None,
            last_updated: now,
        };
        self.store.create(record).await?;

        self.foreground.start(&trip_id, &conductor_id);
        self.publisher = Some(spawn_publisher(
            Arc::clone(&self.store),
            Arc::clone(&self.location),
            trip_id.clone(),
            self.report_interval,
        ));
        self.state = SessionState::Active {
            trip_id: trip_id.clone(),
            status: TripStatus::Available,
        };

        info!(trip_id = %trip_id, route = route_name, matatu = matatu_id, "Trip started");
        Ok(trip_id)
    }

    /// Flips available ⇄ full and publishes the new status.
    ///
    /// Returns the new status, or `None` (after a warning) when no trip is
    /// active. Local state only flips once the write succeeds.
    pub async fn toggle_status(&mut self) -> Result<Option<TripStatus>, TrackerError> {
        let SessionState::Active { trip_id, status } = &self.state else {
            warn!("No active trip, start a trip first");
            return Ok(None);
        };
        let next = status.toggled();
        self.store.update_status(trip_id, next).await?;

        let trip_id = trip_id.clone();
        info!(trip_id = %trip_id, status = ?next, "Status updated");
        self.state = SessionState::Active {
            trip_id,
            status: next,
        };
        Ok(Some(next))
    }

    /// Ends the active trip: cancels the publisher, completes the record,
    /// and re-arms the session.
    ///
    /// Idempotent: with no active trip only local state is reset and
    /// nothing is written.
    pub async fn end_trip(&mut self) -> Result<(), TrackerError> {
        if let Some(publisher) = self.publisher.take() {
            publisher.abort();
        }
        let SessionState::Active { trip_id, .. } =
            std::mem::replace(&mut self.state, SessionState::Idle)
        else {
            debug!("No active trip, nothing to end");
            return Ok(());
        };

        self.foreground.stop();
        self.store.complete(&trip_id, Utc::now()).await?;
        info!(trip_id = %trip_id, "Trip ended");
        Ok(())
    }
}

impl Drop for TripSession {
    // Failsafe: a session torn down mid-trip must not leave an orphaned
    // publisher behind. The record stays `available` with a stale
    // last-updated timestamp; that inconsistency is accepted.
    fn drop(&mut self) {
        if let Some(publisher) = self.publisher.take() {
            publisher.abort();
            self.foreground.stop();
            warn!("Session dropped while active, position publication cancelled");
        }
    }
}

/// Periodic position publication for one trip.
///
/// Each tick obtains a fix and fires the write without awaiting it; a
/// missing fix or a failed write is logged and retried by the next tick,
/// never aborting the session. Last write wins.
fn spawn_publisher(
    store: Arc<dyn TripStore>,
    location: Arc<dyn LocationProvider>,
    trip_id: String,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = time::interval(period);
        // Delayed catch-up keeps reports a full period apart after a
        // stall instead of bursting.
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;

            let position = match location.last_known().await {
                Ok(Some(position)) => position,
                Ok(None) => {
                    debug!(trip_id = %trip_id, "No position fix, skipping report");
                    continue;
                }
                Err(e) => {
                    warn!(trip_id = %trip_id, error = %e, "Location unavailable, skipping report");
                    continue;
                }
            };

            debug!(
                trip_id = %trip_id,
                lat = position.latitude,
                lng = position.longitude,
                "Publishing position report"
            );
            let store = Arc::clone(&store);
            let write_trip_id = trip_id.clone();
            tokio::spawn(async move {
                if let Err(e) = store
                    .update_position(&write_trip_id, position, Utc::now())
                    .await
                {
                    warn!(
                        trip_id = %write_trip_id,
                        error = %e,
                        "Position write failed, retrying on next tick"
                    );
                }
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Geocoordinate;
    use crate::providers::{
        DeniedLocation, FixedLocation, NoIdentity, NoopForeground, StaticIdentity,
    };
    use crate::store::MemoryTripStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    const ROUTE: &str = "Roysambu to Nairobi Town";

    fn session_over(store: Arc<dyn TripStore>) -> TripSession {
        TripSession::new(
            store,
            Arc::new(FixedLocation(Geocoordinate::new(-1.27465, 36.82437))),
            Arc::new(StaticIdentity("conductor-1".into())),
            Arc::new(NoopForeground),
        )
        .with_report_interval(Duration::from_millis(10))
    }

    /// Store wrapper counting terminal completes, for idempotency checks.
    struct CountingStore {
        inner: MemoryTripStore,
        completes: AtomicUsize,
    }

    #[async_trait]
    impl TripStore for CountingStore {
        async fn create(&self, record: TripRecord) -> Result<(), TrackerError> {
            self.inner.create(record).await
        }
        async fn update_position(
            &self,
            trip_id: &str,
            position: Geocoordinate,
            at: DateTime<Utc>,
        ) -> Result<(), TrackerError> {
            self.inner.update_position(trip_id, position, at).await
        }
        async fn update_status(
            &self,
            trip_id: &str,
            status: TripStatus,
        ) -> Result<(), TrackerError> {
            self.inner.update_status(trip_id, status).await
        }
        async fn complete(
            &self,
            trip_id: &str,
            end_time: DateTime<Utc>,
        ) -> Result<(), TrackerError> {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.inner.complete(trip_id, end_time).await
        }
        async fn get(&self, trip_id: &str) -> Result<Option<TripRecord>, TrackerError> {
            self.inner.get(trip_id).await
        }
        async fn subscribe(
            &self,
            route_name: &str,
            status: TripStatus,
        ) -> mpsc::Receiver<crate::store::Snapshot> {
            self.inner.subscribe(route_name, status).await
        }
    }

    /// Store whose creates always fail, for abort-path checks.
    struct FailingStore;

    #[async_trait]
    impl TripStore for FailingStore {
        async fn create(&self, _record: TripRecord) -> Result<(), TrackerError> {
            Err(TrackerError::Persistence("store offline".into()))
        }
        async fn update_position(
            &self,
            _trip_id: &str,
            _position: Geocoordinate,
            _at: DateTime<Utc>,
        ) -> Result<(), TrackerError> {
            Err(TrackerError::Persistence("store offline".into()))
        }
        async fn update_status(
            &self,
            _trip_id: &str,
            _status: TripStatus,
        ) -> Result<(), TrackerError> {
            Err(TrackerError::Persistence("store offline".into()))
        }
        async fn complete(
            &self,
            _trip_id: &str,
            _end_time: DateTime<Utc>,
        ) -> Result<(), TrackerError> {
            Err(TrackerError::Persistence("store offline".into()))
        }
        async fn get(&self, _trip_id: &str) -> Result<Option<TripRecord>, TrackerError> {
            Err(TrackerError::Persistence("store offline".into()))
        }
        async fn subscribe(
            &self,
            _route_name: &str,
            _status: TripStatus,
        ) -> mpsc::Receiver<crate::store::Snapshot> {
            let (tx, rx) = mpsc::channel(1);
            let _ = tx
                .send(Err(TrackerError::Transport("store offline".into())))
                .await;
            rx
        }
    }

    #[tokio::test]
    async fn test_start_requires_identity() {
        let store = Arc::new(MemoryTripStore::new());
        let mut session = TripSession::new(
            store,
            Arc::new(FixedLocation(Geocoordinate::new(0.0, 0.0))),
            Arc::new(NoIdentity),
            Arc::new(NoopForeground),
        );

        let result = session.start_trip(ROUTE, "KCA 123A").await;
        assert!(matches!(result, Err(TrackerError::Validation(_))));
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_failed_create_leaves_session_idle() {
        let mut session = session_over(Arc::new(FailingStore));
        let result = session.start_trip(ROUTE, "KCA 123A").await;
        assert!(matches!(result, Err(TrackerError::Persistence(_))));
        assert!(!session.is_active());
        assert!(session.publisher.is_none());
    }

    #[tokio::test]
    async fn test_reentrant_start_keeps_first_trip() {
        let store = Arc::new(MemoryTripStore::new());
        let mut session = session_over(store.clone());

        let first = session.start_trip(ROUTE, "KCA 123A").await.unwrap();
        let second = session.start_trip(ROUTE, "KCB 456B").await;
        assert!(matches!(second, Err(TrackerError::Validation(_))));
        assert_eq!(
            session.state(),
            &SessionState::Active {
                trip_id: first.clone(),
                status: TripStatus::Available
            }
        );
        assert!(store.get(&first).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_toggle_status_is_its_own_inverse() {
        let store = Arc::new(MemoryTripStore::new());
        let mut session = session_over(store.clone());
        let trip_id = session.start_trip(ROUTE, "KCA 123A").await.unwrap();

        assert_eq!(
            session.toggle_status().await.unwrap(),
            Some(TripStatus::Full)
        );
        assert_eq!(
            store.get(&trip_id).await.unwrap().unwrap().status,
            TripStatus::Full
        );

        assert_eq!(
            session.toggle_status().await.unwrap(),
            Some(TripStatus::Available)
        );
        assert_eq!(
            store.get(&trip_id).await.unwrap().unwrap().status,
            TripStatus::Available
        );
    }

    #[tokio::test]
    async fn test_toggle_without_trip_is_a_noop() {
        let store = Arc::new(MemoryTripStore::new());
        let mut session = session_over(store);
        assert_eq!(session.toggle_status().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_end_trip_is_idempotent() {
        let store = Arc::new(CountingStore {
            inner: MemoryTripStore::new(),
            completes: AtomicUsize::new(0),
        });
        let mut session = session_over(store.clone());
        let trip_id = session.start_trip(ROUTE, "KCA 123A").await.unwrap();

        session.end_trip().await.unwrap();
        session.end_trip().await.unwrap();

        assert!(!session.is_active());
        assert_eq!(store.completes.load(Ordering::SeqCst), 1);
        let completed = store.get(&trip_id).await.unwrap().unwrap();
        assert_eq!(completed.status, TripStatus::Complete);
        assert!(completed.end_time.is_some());
    }

    #[tokio::test]
    async fn test_session_is_restartable_after_end() {
        let store = Arc::new(MemoryTripStore::new());
        let mut session = session_over(store.clone());

        let first = session.start_trip(ROUTE, "KCA 123A").await.unwrap();
        session.end_trip().await.unwrap();
        let second = session.start_trip(ROUTE, "KCA 123A").await.unwrap();

        assert_ne!(first, second);
        assert!(session.is_active());
        session.end_trip().await.unwrap();
    }

    #[tokio::test]
    async fn test_publisher_reports_positions() {
        let store = Arc::new(MemoryTripStore::new());
        let mut session = session_over(store.clone());
        let trip_id = session.start_trip(ROUTE, "KCA 123A").await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        let record = store.get(&trip_id).await.unwrap().unwrap();
        assert_eq!(
            record.position,
            Some(Geocoordinate::new(-1.27465, 36.82437))
        );

        session.end_trip().await.unwrap();
    }

    #[tokio::test]
    async fn test_denied_location_skips_reports_without_ending_session() {
        let store = Arc::new(MemoryTripStore::new());
        let mut session = TripSession::new(
            store.clone(),
            Arc::new(DeniedLocation),
            Arc::new(StaticIdentity("conductor-1".into())),
            Arc::new(NoopForeground),
        )
        .with_report_interval(Duration::from_millis(10));
        let trip_id = session.start_trip(ROUTE, "KCA 123A").await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let record = store.get(&trip_id).await.unwrap().unwrap();
        assert_eq!(record.position, None);
        assert!(session.is_active());
    }

    #[tokio::test]
    async fn test_drop_cancels_publication() {
        let store = Arc::new(MemoryTripStore::new());
        let mut session = session_over(store.clone());
        let trip_id = session.start_trip(ROUTE, "KCA 123A").await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(session);

        // Give any in-flight write time to land, then expect silence.
        tokio::time::sleep(Duration::from_millis(30)).await;
        let after_drop = store.get(&trip_id).await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let later = store.get(&trip_id).await.unwrap().unwrap();

        assert_eq!(after_drop.last_updated, later.last_updated);
        // The record was never completed; it is left available and stale.
        assert_eq!(later.status, TripStatus::Available);
        assert_eq!(later.end_time, None);
    }
}
