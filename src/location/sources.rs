use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::models::Coordinates;

use super::{LocationError, PositionSource};

/// Position pinned in settings. `None` behaves like a device without geolocation.
pub struct FixedPositionSource {
    coordinates: Option<Coordinates>,
}

impl FixedPositionSource {
    pub fn new(coordinates: Option<Coordinates>) -> Self {
        Self { coordinates }
    }
}

#[async_trait]
impl PositionSource for FixedPositionSource {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        self.coordinates.ok_or(LocationError::Unsupported)
    }
}

#[derive(Deserialize)]
struct IpLocationResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Approximate position from an IP geolocation service returning `{latitude, longitude}`.
pub struct IpPositionSource {
    client: Client,
    url: String,
}

impl IpPositionSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl PositionSource for IpPositionSource {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| LocationError::Unavailable(err.to_string()))?;

        match response.status() {
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
                return Err(LocationError::PermissionDenied)
            }
            status if !status.is_success() => {
                return Err(LocationError::Unavailable(format!(
                    "location service returned {status}"
                )))
            }
            _ => {}
        }

        let body: IpLocationResponse = response
            .json()
            .await
            .map_err(|err| LocationError::Unavailable(err.to_string()))?;

        match (body.latitude, body.longitude) {
            (Some(latitude), Some(longitude)) => Ok(Coordinates::new(latitude, longitude)),
            _ => Err(LocationError::Unavailable(
                "location service returned no coordinates".into(),
            )),
        }
    }
}
