//! Error kinds shared across the tracking core.

use thiserror::Error;

/// Everything that can go wrong in the core, by kind.
///
/// `NotFound` from segment matching is a recognized fallback condition for
/// callers, never a fault; the journey planner degrades to a direct path.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Malformed route or record, e.g. a route registered with no stops.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The geolocation provider cannot be used without a permission grant.
    #[error("location permission unavailable")]
    PermissionUnavailable,

    /// No stop, route, or segment satisfies the query.
    #[error("not found: {0}")]
    NotFound(String),

    /// A trip store read or write failed.
    #[error("trip store failure: {0}")]
    Persistence(String),

    /// The live subscription channel itself failed. Distinct from an empty
    /// result: "couldn't ask" rather than "nobody available".
    #[error("subscription transport failure: {0}")]
    Transport(String),
}
