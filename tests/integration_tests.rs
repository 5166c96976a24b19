use std::sync::Arc;
use std::time::Duration;

use matatu_tracker::geo::Geocoordinate;
use matatu_tracker::journey::{JourneyPlan, JourneyPlanner};
use matatu_tracker::network::RouteNetwork;
use matatu_tracker::providers::{FixedLocation, NoopForeground, StaticIdentity};
use matatu_tracker::session::TripSession;
use matatu_tracker::store::MemoryTripStore;
use matatu_tracker::tracker::{LiveTracker, TrackingUpdate};

const ROUTE: &str = "Roysambu to Nairobi Town";

#[test]
fn journey_projects_onto_the_full_route() {
    let network = RouteNetwork::nairobi_default();
    let planner = JourneyPlanner::new(&network);
    let stops = network.route(ROUTE).unwrap().stops.clone();

    let plan = planner.plan(stops[0], stops[10]).unwrap();
    match plan {
        JourneyPlan::Multimodal {
            board,
            waypoints,
            alight,
            ..
        } => {
            assert_eq!(board, stops[0]);
            assert_eq!(alight, stops[10]);
            assert_eq!(waypoints, stops[1..10].to_vec());
        }
        other => panic!("expected multimodal plan, got {other:?}"),
    }
}

#[tokio::test]
async fn conductor_position_reports_reach_the_rider() {
    let store = Arc::new(MemoryTripStore::new());
    let vehicle_position = Geocoordinate::new(-1.27465, 36.82437); // Ngara
    let rider = Geocoordinate::new(-1.28329, 36.82475); // Odeon

    let mut session = TripSession::new(
        store.clone(),
        Arc::new(FixedLocation(vehicle_position)),
        Arc::new(StaticIdentity("conductor-1".into())),
        Arc::new(NoopForeground),
    )
    .with_report_interval(Duration::from_millis(20));

    let tracker = LiveTracker::new(store.clone());
    let mut updates = tracker.track(rider, ROUTE).await;

    // Before any trip exists the rider sees the distinguished empty
    // result, not an error.
    assert_eq!(updates.recv().await, Some(TrackingUpdate::NoMatches));

    session.start_trip(ROUTE, "KCA 123A").await.unwrap();

    // Wait until a published position flows through the subscription.
    let estimates = loop {
        let update = tokio::time::timeout(Duration::from_secs(5), updates.recv())
            .await
            .expect("tracking update timed out")
            .expect("tracking stream closed");
        match update {
            TrackingUpdate::Matches(estimates) if !estimates.is_empty() => break estimates,
            _ => continue,
        }
    };

    assert_eq!(estimates.len(), 1);
    assert_eq!(estimates[0].matatu_id, "KCA 123A");
    assert!(estimates[0].distance_m > 900.0 && estimates[0].distance_m < 1_100.0);
    assert_eq!(estimates[0].eta_minutes, 3); // ~960 m at 5.55 m/s

    session.end_trip().await.unwrap();

    // Once the trip completes it stops matching and the rider is told
    // nobody is available.
    loop {
        let update = tokio::time::timeout(Duration::from_secs(5), updates.recv())
            .await
            .expect("tracking update timed out")
            .expect("tracking stream closed");
        if update == TrackingUpdate::NoMatches {
            break;
        }
    }
}
