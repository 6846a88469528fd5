use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::task::JoinHandle;

use crate::{
    context::AppContext, enrichment::TreatmentAdvisor, history::HistoryStore, models::Language,
};
use crate::{log_debug, log_info, log_warn};

use super::PipelineError;

const ENABLE_LOGS: bool = true;

/// Latest outstanding refresh token per record id.
#[derive(Default)]
struct Generations {
    next: u64,
    latest: HashMap<String, u64>,
}

impl Generations {
    fn issue(&mut self, record_id: &str) -> u64 {
        self.next += 1;
        self.latest.insert(record_id.to_string(), self.next);
        self.next
    }

    /// True if `token` is still the latest for the record; the entry is then removed.
    fn settle(&mut self, record_id: &str, token: u64) -> bool {
        if self.latest.get(record_id) == Some(&token) {
            self.latest.remove(record_id);
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoRecordDisplayed,
    RecordNotFound,
    Healthy,
    UnidentifiedDisease,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Updated { record_id: String, language: Language },
    Skipped(SkipReason),
    /// A newer request for the same record was issued before this one finished.
    Superseded,
    Failed(PipelineError),
}

/// Re-fetches treatment for the displayed record when the language changes.
///
/// Each request takes a token from one increasing counter and registers it as
/// the latest for its record id. A response is only written if its token is
/// still the latest, so the most recently requested language wins regardless
/// of arrival order. The entry is dropped once the latest request settles.
#[derive(Clone)]
pub struct LanguageReactor {
    context: AppContext,
    history: HistoryStore,
    advisor: Arc<dyn TreatmentAdvisor>,
    generations: Arc<Mutex<Generations>>,
    timeout: Duration,
}

impl LanguageReactor {
    pub fn new(
        context: AppContext,
        history: HistoryStore,
        advisor: Arc<dyn TreatmentAdvisor>,
        timeout: Duration,
    ) -> Self {
        Self {
            context,
            history,
            advisor,
            generations: Arc::new(Mutex::new(Generations::default())),
            timeout,
        }
    }

    fn generations(&self) -> MutexGuard<'_, Generations> {
        match self.generations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Updates the context language and, if it changed, starts a refresh for
    /// the displayed record in the background.
    pub fn change_language(&self, language: Language) -> Option<JoinHandle<RefreshOutcome>> {
        if !self.context.set_language(language) {
            return None;
        }
        let reactor = self.clone();
        Some(tokio::spawn(async move {
            reactor.on_language_changed(language).await
        }))
    }

    pub async fn on_language_changed(&self, language: Language) -> RefreshOutcome {
        match self.context.displayed_record() {
            Some(record_id) => self.refresh(&record_id, language).await,
            None => RefreshOutcome::Skipped(SkipReason::NoRecordDisplayed),
        }
    }

    pub async fn refresh(&self, record_id: &str, language: Language) -> RefreshOutcome {
        // Only records already in history are eligible, which excludes any
        // record the orchestrator is still building.
        let Some(record) = self.history.get(record_id) else {
            return RefreshOutcome::Skipped(SkipReason::RecordNotFound);
        };
        if record.is_healthy {
            return RefreshOutcome::Skipped(SkipReason::Healthy);
        }
        if !record.accepts_treatment_refresh() {
            return RefreshOutcome::Skipped(SkipReason::UnidentifiedDisease);
        }

        let generation = self.generations().issue(&record.id);
        log_debug!(
            "Treatment refresh #{generation} for record {} in {language}",
            record.id
        );

        let result = tokio::time::timeout(
            self.timeout,
            self.advisor.recommend(&record.disease_type, language),
        )
        .await;

        let mut generations = self.generations();
        if !generations.settle(&record.id, generation) {
            log_info!(
                "Discarding stale treatment #{generation} ({language}) for record {}",
                record.id
            );
            return RefreshOutcome::Superseded;
        }

        match result {
            Ok(Ok(treatment)) => {
                self.history.update_treatment(&record.id, Some(treatment));
                drop(generations);
                log_info!("Treatment for record {} refreshed in {language}", record.id);
                RefreshOutcome::Updated {
                    record_id: record.id,
                    language,
                }
            }
            Ok(Err(err)) => {
                log_warn!("Treatment refresh failed for record {}: {err:#}", record.id);
                RefreshOutcome::Failed(PipelineError::TreatmentFetchFailed(format!("{err:#}")))
            }
            Err(_) => {
                log_warn!("Treatment refresh timed out for record {}", record.id);
                RefreshOutcome::Failed(PipelineError::TreatmentFetchFailed(
                    "treatment service did not respond in time".into(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settled_records_are_forgotten() {
        let mut generations = Generations::default();
        let first = generations.issue("a");
        let second = generations.issue("a");
        let other = generations.issue("b");

        assert!(!generations.settle("a", first));
        assert!(generations.settle("a", second));
        assert!(generations.settle("b", other));
        assert!(generations.latest.is_empty());

        // A late reply from before the entry was dropped stays stale.
        let third = generations.issue("a");
        assert!(!generations.settle("a", first));
        assert!(generations.settle("a", third));
    }
}
