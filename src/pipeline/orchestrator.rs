use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;

use crate::{
    analysis::{BackendKind, BackendSet, ImageSubmission},
    context::AppContext,
    enrichment::{ReverseGeocoder, TreatmentAdvisor},
    history::HistoryStore,
    location::LocationProvider,
    models::{Coordinates, Language, PredictionRecord},
};

use super::{LanguageReactor, PipelineError, PipelineState, PipelineStatus, RefreshOutcome};

const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 60;
const DEFAULT_ENRICHMENT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub analysis_timeout: Duration,
    pub enrichment_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            analysis_timeout: Duration::from_secs(DEFAULT_ANALYSIS_TIMEOUT_SECS),
            enrichment_timeout: Duration::from_secs(DEFAULT_ENRICHMENT_TIMEOUT_SECS),
        }
    }
}

/// A produced record plus the non-fatal problems met on the way.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub record: PredictionRecord,
    #[serde(serialize_with = "serialize_warnings")]
    pub warnings: Vec<PipelineError>,
}

fn serialize_warnings<S>(warnings: &[PipelineError], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(warnings.iter().map(|warning| warning.user_message()))
}

impl SubmissionOutcome {
    pub fn location_warning(&self) -> Option<&PipelineError> {
        self.warnings
            .iter()
            .find(|warning| matches!(warning, PipelineError::LocationError(_)))
    }

    pub fn treatment_warning(&self) -> Option<&PipelineError> {
        self.warnings
            .iter()
            .find(|warning| matches!(warning, PipelineError::TreatmentFetchFailed(_)))
    }
}

/// Holds the pipeline slot for one submission and frees it on drop, so an
/// early return or a dropped future never leaves the pipeline busy.
struct SubmissionSlot<'a> {
    state: &'a Mutex<PipelineState>,
    record_id: Option<String>,
}

impl SubmissionSlot<'_> {
    fn advance(&self, status: PipelineStatus) {
        lock_state(self.state).advance(status);
    }
}

impl Drop for SubmissionSlot<'_> {
    fn drop(&mut self) {
        let mut state = lock_state(self.state);
        match self.record_id.take() {
            Some(id) => state.complete(id),
            None => state.reset(),
        }
    }
}

fn lock_state(state: &Mutex<PipelineState>) -> MutexGuard<'_, PipelineState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Runs submissions: locate, classify, build the record, enrich, persist.
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    state: Arc<Mutex<PipelineState>>,
    context: AppContext,
    location: LocationProvider,
    backends: BackendSet,
    advisor: Arc<dyn TreatmentAdvisor>,
    geocoder: Arc<dyn ReverseGeocoder>,
    history: HistoryStore,
    reactor: LanguageReactor,
    config: OrchestratorConfig,
}

impl AnalysisOrchestrator {
    pub fn new(
        context: AppContext,
        location: LocationProvider,
        backends: BackendSet,
        advisor: Arc<dyn TreatmentAdvisor>,
        geocoder: Arc<dyn ReverseGeocoder>,
        history: HistoryStore,
        config: OrchestratorConfig,
    ) -> Self {
        let reactor = LanguageReactor::new(
            context.clone(),
            history.clone(),
            Arc::clone(&advisor),
            config.enrichment_timeout,
        );

        Self {
            state: Arc::new(Mutex::new(PipelineState::new())),
            context,
            location,
            backends,
            advisor,
            geocoder,
            history,
            reactor,
            config,
        }
    }

    pub fn snapshot(&self) -> PipelineState {
        lock_state(&self.state).clone()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Language reactor sharing this orchestrator's refresh tokens.
    pub fn reactor(&self) -> &LanguageReactor {
        &self.reactor
    }

    /// Submits with the backend and language currently selected in the context.
    pub async fn submit_current(
        &self,
        image: Option<&ImageSubmission>,
    ) -> Result<SubmissionOutcome, PipelineError> {
        self.submit(image, self.context.backend(), self.context.language())
            .await
    }

    pub async fn submit(
        &self,
        image: Option<&ImageSubmission>,
        backend: BackendKind,
        language: Language,
    ) -> Result<SubmissionOutcome, PipelineError> {
        let image = match image {
            Some(image) if !image.bytes.is_empty() => image,
            _ => return Err(PipelineError::NoImageSelected),
        };

        let mut slot = self.claim(backend)?;
        let mut warnings = Vec::new();

        info!(
            "Analyzing {} ({} bytes) with {backend}",
            image.file_name,
            image.bytes.len()
        );

        // Only this value is used for the rest of the run; the provider's
        // shared cache may be rewritten by other callers meanwhile.
        let coordinates = match self.location.acquire().await {
            Ok(coordinates) => Some(coordinates),
            Err(err) => {
                warn!("Continuing without location: {err}");
                warnings.push(PipelineError::LocationError(err));
                None
            }
        };

        slot.advance(PipelineStatus::Classifying);
        let classifier = self.backends.get(backend);
        let output = match tokio::time::timeout(
            self.config.analysis_timeout,
            classifier.classify(image),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                error!("{backend} classification failed: {err:#}");
                return Err(PipelineError::AnalysisFailed(format!("{err:#}")));
            }
            Err(_) => {
                error!(
                    "{backend} classification timed out after {:?}",
                    self.config.analysis_timeout
                );
                return Err(PipelineError::AnalysisFailed(format!(
                    "{backend} did not respond within {:?}",
                    self.config.analysis_timeout
                )));
            }
        };

        let user_id = self.context.current_user().map(|user| user.id);
        let mut record = PredictionRecord::new(
            output.into_classification(),
            coordinates,
            image.image_url.clone(),
            user_id,
        );
        info!(
            "Record {}: healthy={} disease='{}' severity={} confidence={:.2}",
            record.id,
            record.is_healthy,
            record.disease_type,
            record.severity.as_str(),
            record.confidence
        );

        slot.advance(PipelineStatus::Enriching);
        let (treatment, place_name) = tokio::join!(
            self.initial_treatment(&record, language),
            self.place_name(&record.id, coordinates)
        );

        match treatment {
            Ok(treatment) => record.treatment = treatment,
            Err(err) => warnings.push(err),
        }
        if let Some(place_name) = place_name {
            record.place_name = place_name;
        }

        slot.advance(PipelineStatus::Persisting);
        if !self.history.append(record.clone()) {
            warn!("Record {} was not appended to history", record.id);
        }
        self.context.show_record(&record);

        // The language may have changed while this record was being built; the
        // reactor skipped it then because it was not displayed yet.
        let current = self.context.language();
        if current != language && record.accepts_treatment_refresh() {
            info!("Language changed to {current} during submission; refreshing treatment");
            if let RefreshOutcome::Failed(err) = self.reactor.refresh(&record.id, current).await {
                if !warnings
                    .iter()
                    .any(|warning| matches!(warning, PipelineError::TreatmentFetchFailed(_)))
                {
                    warnings.push(err);
                }
            }
            if let Some(latest) = self.history.get(&record.id) {
                record = latest;
            }
        }
        slot.record_id = Some(record.id.clone());

        Ok(SubmissionOutcome { record, warnings })
    }

    fn claim(&self, backend: BackendKind) -> Result<SubmissionSlot<'_>, PipelineError> {
        let mut state = lock_state(&self.state);
        if state.status.is_busy() {
            warn!("Rejecting submission: pipeline is {:?}", state.status);
            return Err(PipelineError::SubmissionInProgress);
        }
        state.begin(backend, Utc::now());

        Ok(SubmissionSlot {
            state: &self.state,
            record_id: None,
        })
    }

    async fn initial_treatment(
        &self,
        record: &PredictionRecord,
        language: Language,
    ) -> Result<Option<String>, PipelineError> {
        if !record.wants_initial_treatment() {
            return Ok(None);
        }

        match tokio::time::timeout(
            self.config.enrichment_timeout,
            self.advisor.recommend(&record.disease_type, language),
        )
        .await
        {
            Ok(Ok(treatment)) => Ok(Some(treatment)),
            Ok(Err(err)) => {
                warn!("Treatment lookup failed for record {}: {err:#}", record.id);
                Err(PipelineError::TreatmentFetchFailed(format!("{err:#}")))
            }
            Err(_) => {
                warn!("Treatment lookup timed out for record {}", record.id);
                Err(PipelineError::TreatmentFetchFailed(
                    "treatment service did not respond in time".into(),
                ))
            }
        }
    }

    async fn place_name(&self, record_id: &str, coordinates: Option<Coordinates>) -> Option<String> {
        let coordinates = coordinates?;

        match tokio::time::timeout(
            self.config.enrichment_timeout,
            self.geocoder.place_name(coordinates),
        )
        .await
        {
            Ok(Ok(name)) => Some(name),
            Ok(Err(err)) => {
                warn!("Reverse geocoding failed for record {record_id}: {err:#}");
                None
            }
            Err(_) => {
                warn!("Reverse geocoding timed out for record {record_id}");
                None
            }
        }
    }
}
