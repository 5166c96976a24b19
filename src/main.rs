//! CLI entry point for the matatu tracker core.
//!
//! Provides subcommands for projecting journeys onto the route network,
//! listing the route catalog, geocoding place queries, and running an
//! end-to-end conductor/rider simulation against the in-memory store.

mod sim;

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use matatu_tracker::geo::Geocoordinate;
use matatu_tracker::geocode::{self, HttpTransport};
use matatu_tracker::journey::{JourneyPlan, JourneyPlanner};
use matatu_tracker::network::RouteNetwork;
use matatu_tracker::providers::{NoopForeground, StaticIdentity};
use matatu_tracker::session::TripSession;
use matatu_tracker::store::MemoryTripStore;
use matatu_tracker::tracker::{LiveTracker, TrackingUpdate};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "matatu_tracker")]
#[command(about = "Match riders to matatu routes and track live ETAs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project a walk/ride/walk journey onto the route network
    Plan {
        /// Rider start as "lat,lng"
        start: String,

        /// Rider destination as "lat,lng"
        destination: String,

        /// Route catalog CSV; the built-in Nairobi network when omitted
        #[arg(short, long)]
        catalog: Option<PathBuf>,
    },
    /// List registered routes and their stops
    Routes {
        /// Route catalog CSV; the built-in Nairobi network when omitted
        #[arg(short, long)]
        catalog: Option<PathBuf>,
    },
    /// Resolve a free-text place query to coordinates
    Search {
        /// Place name or address fragment
        query: String,
    },
    /// Run a conductor and a rider end-to-end against the in-memory store
    Simulate {
        /// Route to serve
        #[arg(short, long, default_value = "Roysambu to Nairobi Town")]
        route: String,

        /// Vehicle registration label
        #[arg(short, long, default_value = "KCA 123A")]
        matatu: String,

        /// Number of ETA updates to watch before ending the trip
        #[arg(short = 'n', long, default_value_t = 5)]
        updates: usize,

        /// Seconds between position reports
        #[arg(short, long, default_value_t = 1)]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/matatu_tracker.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("matatu_tracker.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            start,
            destination,
            catalog,
        } => {
            let network = load_network(catalog.as_deref())?;
            let start = parse_coordinate(&start)?;
            let destination = parse_coordinate(&destination)?;

            let planner = JourneyPlanner::new(&network);
            match planner.plan(start, destination)? {
                JourneyPlan::Multimodal {
                    board,
                    waypoints,
                    alight,
                    ..
                } => {
                    info!(board = %board, alight = %alight, "Walk to the boarding stage, ride, walk on");
                    info!(
                        interior_stops = waypoints.len(),
                        ride_stops = waypoints.len() + 2,
                        "Matatu ride segment"
                    );
                    for (i, stop) in waypoints.iter().enumerate() {
                        info!(index = i + 1, stop = %stop, "Waypoint");
                    }
                }
                plan @ JourneyPlan::Direct { .. } => {
                    warn!("No matatu segment serves this journey, showing the direct path");
                    for point in plan.navigation_waypoints() {
                        info!(point = %point, "Direct path point");
                    }
                }
            }
        }
        Commands::Routes { catalog } => {
            let network = load_network(catalog.as_deref())?;
            info!(
                routes = network.routes().len(),
                distinct_stops = network.stops().len(),
                "Route network"
            );
            for route in network.routes() {
                info!(route = %route.name, stops = route.stops.len(), "Route");
            }
        }
        Commands::Search { query } => {
            let api_key = std::env::var("OPENCAGE_API_KEY")
                .context("OPENCAGE_API_KEY must be set for place search")?;
            let transport = HttpTransport::new();
            let places = geocode::search(&transport, &api_key, &query).await?;

            if places.is_empty() {
                info!(query = %query, "No places matched");
            }
            for place in places {
                info!(address = %place.formatted_address, position = %place.position, "Place");
            }
        }
        Commands::Simulate {
            route,
            matatu,
            updates,
            interval,
        } => {
            simulate(&route, &matatu, updates, interval).await?;
        }
    }

    Ok(())
}

fn load_network(catalog: Option<&Path>) -> Result<RouteNetwork> {
    let network = match catalog {
        Some(path) => RouteNetwork::from_catalog_path(path)?,
        None => RouteNetwork::nairobi_default(),
    };
    Ok(network)
}

fn parse_coordinate(raw: &str) -> Result<Geocoordinate> {
    let (lat, lng) = raw
        .split_once(',')
        .with_context(|| format!("expected \"lat,lng\", got '{raw}'"))?;
    Ok(Geocoordinate::new(
        lat.trim().parse().with_context(|| format!("bad latitude in '{raw}'"))?,
        lng.trim().parse().with_context(|| format!("bad longitude in '{raw}'"))?,
    ))
}

/// Wires both concurrency domains together: a conductor session replaying
/// the route's stops as position fixes, and a rider tracking the same
/// route from its first stop.
#[tracing::instrument(skip_all, fields(route = route_name, matatu = matatu))]
async fn simulate(route_name: &str, matatu: &str, updates: usize, interval: u64) -> Result<()> {
    let network = RouteNetwork::nairobi_default();
    let route = network
        .route(route_name)
        .with_context(|| format!("unknown route '{route_name}'"))?;

    let store = Arc::new(MemoryTripStore::new());
    let playback = Arc::new(sim::RoutePlayback::new(route.stops.clone()));

    let mut session = TripSession::new(
        store.clone(),
        playback,
        Arc::new(StaticIdentity("sim-conductor".into())),
        Arc::new(NoopForeground),
    )
    .with_report_interval(Duration::from_secs(interval));

    let trip_id = session.start_trip(route_name, matatu).await?;
    info!(trip_id = %trip_id, route = route_name, "Simulated trip started");

    let rider = route.stops[0];
    let tracker = LiveTracker::new(store.clone());
    let mut stream = tracker.track(rider, route_name).await;

    let mut seen = 0;
    while seen < updates {
        let timeout = Duration::from_secs(interval * 2 + 5);
        match tokio::time::timeout(timeout, stream.recv()).await {
            Ok(Some(TrackingUpdate::Matches(estimates))) => {
                seen += 1;
                for eta in &estimates {
                    info!(
                        matatu = %eta.matatu_id,
                        distance_m = format_args!("{:.0}", eta.distance_m),
                        eta_minutes = eta.eta_minutes,
                        "ETA update"
                    );
                }
            }
            Ok(Some(TrackingUpdate::NoMatches)) => {
                info!("No available matatu to your destination at the moment");
            }
            Ok(Some(TrackingUpdate::TransportError(e))) => {
                warn!(error = %e, "Tracking subscription failed");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                warn!("Timed out waiting for tracking updates");
                break;
            }
        }
    }

    session.end_trip().await?;
    info!("Simulation complete");
    Ok(())
}
