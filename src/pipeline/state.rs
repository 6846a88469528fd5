use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::BackendKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStatus {
    #[default]
    Idle,
    Locating,
    Classifying,
    Enriching,
    Persisting,
}

impl PipelineStatus {
    pub fn is_busy(&self) -> bool {
        *self != PipelineStatus::Idle
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    pub status: PipelineStatus,
    pub backend: Option<BackendKind>,
    pub started_at: Option<DateTime<Utc>>,
    /// Id of the last record this pipeline produced.
    pub last_record_id: Option<String>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, backend: BackendKind, now: DateTime<Utc>) {
        self.status = PipelineStatus::Locating;
        self.backend = Some(backend);
        self.started_at = Some(now);
    }

    pub fn advance(&mut self, status: PipelineStatus) {
        self.status = status;
    }

    pub fn complete(&mut self, record_id: String) {
        self.last_record_id = Some(record_id);
        self.reset();
    }

    pub fn reset(&mut self) {
        self.status = PipelineStatus::Idle;
        self.backend = None;
        self.started_at = None;
    }
}
