use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use log::{info, warn};

use crate::models::Coordinates;

use super::{LocationError, PositionSource};

#[derive(Default)]
struct LocationState {
    last_known: Option<Coordinates>,
    last_error: Option<LocationError>,
}

/// On-demand location acquisition with a shared last-known cache for display.
///
/// Callers inside a pipeline run must use the value returned by [`acquire`]
/// rather than [`last_known`]; the cache may be replaced by a concurrent call.
///
/// [`acquire`]: LocationProvider::acquire
/// [`last_known`]: LocationProvider::last_known
#[derive(Clone)]
pub struct LocationProvider {
    source: Arc<dyn PositionSource>,
    state: Arc<RwLock<LocationState>>,
    timeout: Duration,
}

impl LocationProvider {
    pub fn new(source: Arc<dyn PositionSource>, timeout: Duration) -> Self {
        Self {
            source,
            state: Arc::new(RwLock::new(LocationState::default())),
            timeout,
        }
    }

    pub async fn acquire(&self) -> Result<Coordinates, LocationError> {
        let result = match tokio::time::timeout(self.timeout, self.source.current_position()).await
        {
            Ok(result) => result,
            Err(_) => Err(LocationError::Timeout),
        };

        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match &result {
            Ok(coords) => {
                info!(
                    "Location acquired ({:.4}, {:.4})",
                    coords.latitude, coords.longitude
                );
                state.last_known = Some(*coords);
                state.last_error = None;
            }
            Err(err) => {
                warn!("Location acquisition failed: {err}");
                state.last_error = Some(err.clone());
            }
        }

        result
    }

    /// Most recent successful fix. May be stale or absent.
    pub fn last_known(&self) -> Option<Coordinates> {
        match self.state.read() {
            Ok(guard) => guard.last_known,
            Err(poisoned) => poisoned.into_inner().last_known,
        }
    }

    pub fn last_error(&self) -> Option<LocationError> {
        match self.state.read() {
            Ok(guard) => guard.last_error.clone(),
            Err(poisoned) => poisoned.into_inner().last_error.clone(),
        }
    }
}
