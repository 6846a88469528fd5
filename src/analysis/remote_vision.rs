use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::models::{Classification, Severity, UNKNOWN_DISEASE};

use super::{AnalysisBackend, BackendKind, BackendOutput, ImageSubmission};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VisionRequest<'a> {
    image: String,
    mime_type: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisionResponse {
    is_healthy: bool,
    #[serde(default)]
    disease_type: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    confidence: f64,
}

/// Hosted vision service that classifies the image directly.
pub struct RemoteVisionBackend {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl RemoteVisionBackend {
    pub fn new(client: Client, url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl AnalysisBackend for RemoteVisionBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::RemoteVision
    }

    async fn classify(&self, image: &ImageSubmission) -> Result<BackendOutput> {
        let payload = VisionRequest {
            image: STANDARD.encode(&image.bytes),
            mime_type: &image.media_type,
        };

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(
            "Sending {} bytes ({}) to remote vision backend",
            image.bytes.len(),
            image.media_type
        );

        let response = request
            .send()
            .await
            .context("remote vision request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("remote vision backend returned {status}: {body}"));
        }

        let body: VisionResponse = response
            .json()
            .await
            .context("remote vision response was not valid JSON")?;

        let severity = body
            .severity
            .as_deref()
            .and_then(|value| Severity::parse(value).ok())
            .unwrap_or(if body.is_healthy {
                Severity::NotApplicable
            } else {
                Severity::Mild
            });

        Ok(BackendOutput::Classified(Classification {
            is_healthy: body.is_healthy,
            disease_type: body
                .disease_type
                .unwrap_or_else(|| UNKNOWN_DISEASE.to_string()),
            severity,
            confidence: body.confidence,
        }))
    }
}
