//! Route catalog loading.
//!
//! A catalog is an ordered CSV of `route,latitude,longitude` rows; row
//! order within a route is the direction of travel, and the first row of
//! each route fixes its registration order.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::TrackerError;
use crate::geo::Geocoordinate;

use super::RouteNetwork;

#[derive(Debug, Deserialize)]
struct CatalogRow {
    route: String,
    latitude: f64,
    longitude: f64,
}

impl RouteNetwork {
    /// Builds a network from a catalog CSV file.
    pub fn from_catalog_path(path: &Path) -> Result<Self, TrackerError> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| {
            TrackerError::Validation(format!("catalog {}: {e}", path.display()))
        })?;

        let mut grouped: Vec<(String, Vec<Geocoordinate>)> = Vec::new();
        for row in reader.deserialize() {
            let row: CatalogRow = row.map_err(|e| {
                TrackerError::Validation(format!("catalog {}: {e}", path.display()))
            })?;
            let stop = Geocoordinate::new(row.latitude, row.longitude);
            match grouped.iter_mut().find(|(name, _)| *name == row.route) {
                Some((_, stops)) => stops.push(stop),
                None => grouped.push((row.route, vec![stop])),
            }
        }

        let mut network = RouteNetwork::new();
        for (name, stops) in grouped {
            network.add_route(&name, stops)?;
        }

        info!(
            catalog = %path.display(),
            routes = network.routes().len(),
            stops = network.stops().len(),
            "Route catalog loaded"
        );
        Ok(network)
    }
}
