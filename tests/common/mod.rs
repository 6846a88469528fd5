#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use coconut_guardian::{
    analysis::{AnalysisBackend, BackendKind, BackendOutput, BackendSet, ImageSubmission},
    context::AppContext,
    enrichment::{ReverseGeocoder, TreatmentAdvisor},
    history::{HistoryMirror, HistoryStore},
    location::{LocationError, LocationProvider, PositionSource},
    models::{Classification, Coordinates, Language, PredictionRecord, Severity},
    pipeline::{AnalysisOrchestrator, OrchestratorConfig},
};

pub const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n', 0, 0];

pub fn leaf_photo() -> ImageSubmission {
    ImageSubmission::new(PNG_MAGIC.to_vec(), "leaf.png", "blob:leaf")
}

pub fn diseased(disease: &str) -> Classification {
    Classification {
        is_healthy: false,
        disease_type: disease.into(),
        severity: Severity::Mild,
        confidence: 0.9,
    }
}

pub fn healthy() -> Classification {
    Classification {
        is_healthy: true,
        disease_type: "Healthy".into(),
        severity: Severity::NotApplicable,
        confidence: 0.97,
    }
}

pub fn record(classification: Classification) -> PredictionRecord {
    PredictionRecord::new(classification, None, "blob:leaf".into(), None)
}

pub struct StaticSource(pub Result<Coordinates, LocationError>);

#[async_trait]
impl PositionSource for StaticSource {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        self.0.clone()
    }
}

/// Answers every classification with the same output after `delay`.
pub struct ScriptedBackend {
    pub kind: BackendKind,
    pub output: Result<BackendOutput, String>,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn answering(kind: BackendKind, output: BackendOutput) -> Self {
        Self {
            kind,
            output: Ok(output),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(kind: BackendKind, message: &str) -> Self {
        Self {
            kind,
            output: Err(message.into()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn classify(&self, _image: &ImageSubmission) -> Result<BackendOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.output.clone().map_err(|message| anyhow!(message))
    }
}

/// Replies `"<code>: care for <disease>"`, optionally slower for some languages.
#[derive(Default)]
pub struct ScriptedAdvisor {
    pub delays: HashMap<Language, Duration>,
    pub fail: bool,
    pub requests: Mutex<Vec<(String, Language)>>,
}

impl ScriptedAdvisor {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, language: Language, delay: Duration) -> Self {
        self.delays.insert(language, delay);
        self
    }

    pub fn requests(&self) -> Vec<(String, Language)> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn advice(disease: &str, language: Language) -> String {
    format!("{}: care for {disease}", language.code())
}

#[async_trait]
impl TreatmentAdvisor for ScriptedAdvisor {
    async fn recommend(&self, disease_type: &str, language: Language) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((disease_type.to_string(), language));
        if let Some(delay) = self.delays.get(&language) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail {
            bail!("treatment service returned 503");
        }
        Ok(advice(disease_type, language))
    }
}

pub struct StaticGeocoder(pub Option<String>);

#[async_trait]
impl ReverseGeocoder for StaticGeocoder {
    async fn place_name(&self, _coordinates: Coordinates) -> Result<String> {
        self.0.clone().ok_or_else(|| anyhow!("geocoder unreachable"))
    }
}

#[derive(Default)]
pub struct RecordingMirror {
    pub seen: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait]
impl HistoryMirror for RecordingMirror {
    fn name(&self) -> &str {
        "recording"
    }

    async fn mirror(&self, record: &PredictionRecord) -> Result<()> {
        self.seen.lock().unwrap().push(record.id.clone());
        if self.fail {
            bail!("save endpoint returned 500");
        }
        Ok(())
    }
}

pub struct Harness {
    pub context: AppContext,
    pub history: HistoryStore,
    pub orchestrator: AnalysisOrchestrator,
}

pub struct HarnessBuilder {
    location: Result<Coordinates, LocationError>,
    remote: Arc<dyn AnalysisBackend>,
    custom: Arc<dyn AnalysisBackend>,
    advisor: Arc<dyn TreatmentAdvisor>,
    geocoder: Arc<dyn ReverseGeocoder>,
    mirrors: Vec<Arc<dyn HistoryMirror>>,
    config: OrchestratorConfig,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            location: Ok(Coordinates::new(10.85, 76.27)),
            remote: Arc::new(ScriptedBackend::answering(
                BackendKind::RemoteVision,
                BackendOutput::Classified(healthy()),
            )),
            custom: Arc::new(ScriptedBackend::failing(
                BackendKind::CustomModel,
                "custom model not configured",
            )),
            advisor: Arc::new(ScriptedAdvisor::default()),
            geocoder: Arc::new(StaticGeocoder(Some("Thrissur, Kerala, India".into()))),
            mirrors: Vec::new(),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn location(mut self, location: Result<Coordinates, LocationError>) -> Self {
        self.location = location;
        self
    }

    pub fn remote(mut self, backend: Arc<dyn AnalysisBackend>) -> Self {
        self.remote = backend;
        self
    }

    pub fn custom(mut self, backend: Arc<dyn AnalysisBackend>) -> Self {
        self.custom = backend;
        self
    }

    pub fn advisor(mut self, advisor: Arc<dyn TreatmentAdvisor>) -> Self {
        self.advisor = advisor;
        self
    }

    pub fn geocoder(mut self, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        self.geocoder = geocoder;
        self
    }

    pub fn mirror(mut self, mirror: Arc<dyn HistoryMirror>) -> Self {
        self.mirrors.push(mirror);
        self
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Harness {
        let context = AppContext::new(Language::English, BackendKind::RemoteVision);
        let location = LocationProvider::new(
            Arc::new(StaticSource(self.location)),
            Duration::from_secs(10),
        );
        let history = HistoryStore::new(self.mirrors);
        let orchestrator = AnalysisOrchestrator::new(
            context.clone(),
            location,
            BackendSet::new(self.remote, self.custom).expect("backend slots"),
            self.advisor,
            self.geocoder,
            history.clone(),
            self.config,
        );

        Harness {
            context,
            history,
            orchestrator,
        }
    }
}
