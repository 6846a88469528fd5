use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::models::Coordinates;

/// Best-effort place lookup. Failures are the caller's to swallow.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn place_name(&self, coordinates: Coordinates) -> Result<String>;
}

#[derive(Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

/// Nominatim-compatible `/reverse?format=json&lat=..&lon=..` lookup.
pub struct HttpReverseGeocoder {
    client: Client,
    url: String,
}

impl HttpReverseGeocoder {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ReverseGeocoder for HttpReverseGeocoder {
    async fn place_name(&self, coordinates: Coordinates) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("format", "json".to_string()),
                ("lat", coordinates.latitude.to_string()),
                ("lon", coordinates.longitude.to_string()),
            ])
            .send()
            .await
            .context("reverse geocoding request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("geocoder returned {status}"));
        }

        let body: ReverseResponse = response
            .json()
            .await
            .context("geocoder response was not valid JSON")?;

        body.display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| anyhow!("geocoder returned no place name"))
    }
}
