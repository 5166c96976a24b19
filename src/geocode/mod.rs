//! Forward geocoding of free-text place queries.
//!
//! Speaks the OpenCage JSON response shape; the HTTP transport sits
//! behind [`GeocodeTransport`] so tests can stub it.

mod transport;

pub use transport::{GeocodeTransport, HttpTransport};

use serde::Deserialize;
use tracing::debug;

use crate::error::TrackerError;
use crate::geo::Geocoordinate;

const GEOCODE_ENDPOINT: &str = "https://api.opencagedata.com/geocode/v1/json";

/// A candidate place resolved from a free-text query.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceResult {
    pub formatted_address: String,
    pub position: Geocoordinate,
}

#[derive(Deserialize)]
struct GeocodeResponse {
    results: Vec<GeocodeResult>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    formatted: String,
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    lat: f64,
    lng: f64,
}

impl From<GeocodeResult> for PlaceResult {
    fn from(result: GeocodeResult) -> Self {
        PlaceResult {
            formatted_address: result.formatted,
            position: Geocoordinate::new(result.geometry.lat, result.geometry.lng),
        }
    }
}

/// Resolves `query` to candidate places.
///
/// An empty candidate list is `Ok`; transport and decoding failures map to
/// the transport error kind.
pub async fn search<T: GeocodeTransport>(
    transport: &T,
    api_key: &str,
    query: &str,
) -> Result<Vec<PlaceResult>, TrackerError> {
    let url = reqwest::Url::parse_with_params(GEOCODE_ENDPOINT, &[("q", query), ("key", api_key)])
        .map_err(|e| TrackerError::Transport(format!("bad geocode url: {e}")))?;

    let resp = transport
        .get(url)
        .await
        .map_err(|e| TrackerError::Transport(format!("geocode request failed: {e}")))?;
    if !resp.status().is_success() {
        return Err(TrackerError::Transport(format!(
            "geocode API returned {}",
            resp.status()
        )));
    }

    let body: GeocodeResponse = resp
        .json()
        .await
        .map_err(|e| TrackerError::Transport(format!("geocode response malformed: {e}")))?;

    let places: Vec<PlaceResult> = body.results.into_iter().map(PlaceResult::from).collect();
    debug!(query, count = places.len(), "Geocode query resolved");
    Ok(places)
}
