// Device location with a graceful fallback
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::Coordinates;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

/// One-shot read of where the device currently is
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// A location fixed up front, e.g. from `--lat/--lng`
///
/// `None` behaves like a user who declined the permission prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticLocation(pub Option<Coordinates>);

#[async_trait]
impl LocationProvider for StaticLocation {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        self.0.ok_or(LocationError::PermissionDenied)
    }
}

/// Current position, or `fallback` when it can't be had
///
/// A denied permission is an expected answer and stays quiet; anything
/// else is worth a warning.
pub async fn resolve_location(
    provider: &dyn LocationProvider,
    fallback: Coordinates,
) -> Coordinates {
    match provider.current_position().await {
        Ok(position) => position,
        Err(LocationError::PermissionDenied) => {
            debug!("Location permission denied, using {}", fallback);
            fallback
        }
        Err(e) => {
            warn!(error = %e, "Could not read location, using {}", fallback);
            fallback
        }
    }
}
