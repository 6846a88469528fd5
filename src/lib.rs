pub mod analysis;
pub mod context;
pub mod db;
pub mod enrichment;
pub mod history;
pub mod location;
pub mod models;
pub mod pipeline;
pub mod settings;
pub mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use reqwest::Client;

use analysis::{BackendSet, CustomModelBackend, RemoteVisionBackend};
use context::AppContext;
use db::Database;
use enrichment::{HttpReverseGeocoder, HttpTreatmentAdvisor, TreatmentAdvisor};
use history::{ArchiveMirror, HistoryMirror, HistoryStore, HttpMirror};
use location::{FixedPositionSource, IpPositionSource, LocationProvider, PositionSource};
use pipeline::{AnalysisOrchestrator, LanguageReactor, OrchestratorConfig};
use settings::AppSettings;

const USER_AGENT: &str = concat!("coconut-guardian/", env!("CARGO_PKG_VERSION"));
const RESTORED_HISTORY_LIMIT: usize = 200;

/// Everything a front end needs to drive analyses for one session.
pub struct AppState {
    pub context: AppContext,
    pub location: LocationProvider,
    pub history: HistoryStore,
    pub orchestrator: AnalysisOrchestrator,
    pub reactor: LanguageReactor,
    pub archive: Option<Database>,
}

impl AppState {
    /// Wires HTTP collaborators from settings and restores archived history.
    pub async fn from_settings(settings: &AppSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(settings.timeouts.connect())
            .timeout(settings.timeouts.request())
            .build()
            .context("failed to build HTTP client")?;

        let context = AppContext::new(settings.language, settings.backend);

        let source: Arc<dyn PositionSource> = match &settings.endpoints.ip_location_url {
            Some(url) => Arc::new(IpPositionSource::new(client.clone(), url.clone())),
            None => Arc::new(FixedPositionSource::new(settings.fixed_coordinates)),
        };
        let location = LocationProvider::new(source, settings.timeouts.location());

        let backends = BackendSet::new(
            Arc::new(RemoteVisionBackend::new(
                client.clone(),
                settings.endpoints.remote_vision_url.clone(),
                settings.endpoints.remote_vision_api_key.clone(),
            )),
            Arc::new(CustomModelBackend::new(
                client.clone(),
                settings.endpoints.custom_model_url.clone(),
            )),
        )?;

        let advisor: Arc<dyn TreatmentAdvisor> = Arc::new(HttpTreatmentAdvisor::new(
            client.clone(),
            settings.endpoints.treatment_url.clone(),
        ));
        let geocoder = Arc::new(HttpReverseGeocoder::new(
            client.clone(),
            settings.endpoints.geocoder_url.clone(),
        ));

        let mut mirrors: Vec<Arc<dyn HistoryMirror>> = Vec::new();
        if let Some(url) = &settings.endpoints.persistence_url {
            mirrors.push(Arc::new(HttpMirror::new(client.clone(), url.clone())));
        }

        let mut restored = Vec::new();
        let archive = match &settings.archive_path {
            Some(path) => {
                let database = Database::new(path.clone())?;
                match database.list_predictions(RESTORED_HISTORY_LIMIT).await {
                    Ok(records) => restored = records,
                    Err(err) => warn!("Could not restore history from archive: {err:#}"),
                }
                mirrors.push(Arc::new(ArchiveMirror::new(database.clone())));
                Some(database)
            }
            None => None,
        };
        if !restored.is_empty() {
            info!("Restored {} records from archive", restored.len());
        }

        let history = HistoryStore::with_records(restored, mirrors)
            .with_mirror_timeout(settings.timeouts.mirror());

        let orchestrator = AnalysisOrchestrator::new(
            context.clone(),
            location.clone(),
            backends,
            advisor,
            geocoder,
            history.clone(),
            OrchestratorConfig {
                analysis_timeout: settings.timeouts.analysis(),
                enrichment_timeout: settings.timeouts.enrichment(),
            },
        );

        let reactor = orchestrator.reactor().clone();

        Ok(Self {
            context,
            location,
            history,
            orchestrator,
            reactor,
            archive,
        })
    }
}
