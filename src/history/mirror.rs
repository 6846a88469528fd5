use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::{db::Database, models::PredictionRecord};

/// Secondary copy of the history. Delivery is best effort and may be lost.
#[async_trait]
pub trait HistoryMirror: Send + Sync {
    fn name(&self) -> &str;

    async fn mirror(&self, record: &PredictionRecord) -> Result<()>;
}

/// Posts each record as camelCase JSON to a remote save endpoint.
pub struct HttpMirror {
    client: Client,
    url: String,
}

impl HttpMirror {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl HistoryMirror for HttpMirror {
    fn name(&self) -> &str {
        "remote"
    }

    async fn mirror(&self, record: &PredictionRecord) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(record)
            .send()
            .await
            .context("failed to reach persistence endpoint")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("persistence endpoint returned {status}"));
        }
        Ok(())
    }
}

/// Writes records into the local SQLite archive.
pub struct ArchiveMirror {
    db: Database,
}

impl ArchiveMirror {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryMirror for ArchiveMirror {
    fn name(&self) -> &str {
        "archive"
    }

    async fn mirror(&self, record: &PredictionRecord) -> Result<()> {
        self.db.upsert_prediction(record).await
    }
}
