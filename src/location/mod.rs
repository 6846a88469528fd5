mod provider;
mod sources;

pub use provider::LocationProvider;
pub use sources::{FixedPositionSource, IpPositionSource};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Coordinates;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    #[error("Geolocation is not supported on this device.")]
    Unsupported,

    #[error("Unable to retrieve your location. Please enable location services.")]
    PermissionDenied,

    #[error("Timed out while retrieving your location. Please enable location services and try again.")]
    Timeout,

    #[error("Unable to retrieve your location: {0}")]
    Unavailable(String),
}

/// Device capability that resolves the current position.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}
