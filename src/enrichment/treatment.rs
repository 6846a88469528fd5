use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::models::Language;

/// Source of treatment guidance for a disease, in the user's language.
#[async_trait]
pub trait TreatmentAdvisor: Send + Sync {
    async fn recommend(&self, disease_type: &str, language: Language) -> Result<String>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TreatmentRequest<'a> {
    disease_type: &'a str,
    language: &'a str,
}

#[derive(Deserialize)]
struct TreatmentResponse {
    treatment: String,
}

pub struct HttpTreatmentAdvisor {
    client: Client,
    url: String,
}

impl HttpTreatmentAdvisor {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl TreatmentAdvisor for HttpTreatmentAdvisor {
    async fn recommend(&self, disease_type: &str, language: Language) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .json(&TreatmentRequest {
                disease_type,
                language: language.code(),
            })
            .send()
            .await
            .context("treatment request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("treatment service returned {status}"));
        }

        let body: TreatmentResponse = response
            .json()
            .await
            .context("treatment response was not valid JSON")?;

        let treatment = body.treatment.trim();
        if treatment.is_empty() {
            bail!("treatment service returned no guidance for '{disease_type}'");
        }
        Ok(treatment.to_string())
    }
}
