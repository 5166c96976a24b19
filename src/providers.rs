//! Seams to the host platform: geolocation, operator identity, and the
//! foreground keep-alive host.

use async_trait::async_trait;

use crate::error::TrackerError;
use crate::geo::Geocoordinate;

/// Supplies the device's best-known position on demand.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// `Ok(None)` means no fix is currently known. A permission refusal is
    /// `Err(TrackerError::PermissionUnavailable)` and callers degrade the
    /// affected feature instead of crashing.
    async fn last_known(&self) -> Result<Option<Geocoordinate>, TrackerError>;
}

/// Supplies the signed-in operator, if any.
pub trait IdentityProvider: Send + Sync {
    fn current_operator(&self) -> Option<String>;
}

/// Keeps the periodic publisher alive while the host app is backgrounded.
///
/// The core only requires that the host can be started with the trip and
/// conductor ids and stopped again; what "foreground" means is up to the
/// host runtime.
pub trait ForegroundHost: Send + Sync {
    fn start(&self, trip_id: &str, conductor_id: &str);
    fn stop(&self);
}

/// Fixed-position provider for tests and simulations.
pub struct FixedLocation(pub Geocoordinate);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn last_known(&self) -> Result<Option<Geocoordinate>, TrackerError> {
        Ok(Some(self.0))
    }
}

/// Location provider standing in for a device with no permission grant.
pub struct DeniedLocation;

#[async_trait]
impl LocationProvider for DeniedLocation {
    async fn last_known(&self) -> Result<Option<Geocoordinate>, TrackerError> {
        Err(TrackerError::PermissionUnavailable)
    }
}

/// Always-signed-in identity for tests and simulations.
pub struct StaticIdentity(pub String);

impl IdentityProvider for StaticIdentity {
    fn current_operator(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Identity provider with nobody signed in.
pub struct NoIdentity;

impl IdentityProvider for NoIdentity {
    fn current_operator(&self) -> Option<String> {
        None
    }
}

/// No-op keep-alive for hosts that never leave the foreground.
#[derive(Default)]
pub struct NoopForeground;

impl ForegroundHost for NoopForeground {
    fn start(&self, _trip_id: &str, _conductor_id: &str) {}
    fn stop(&self) {}
}
