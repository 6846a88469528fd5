use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::{analysis::BackendKind, models::Coordinates, models::Language};

pub const DEBUG_ENV: &str = "COCONUT_GUARDIAN_DEBUG";
pub const LANGUAGE_ENV: &str = "COCONUT_GUARDIAN_LANG";
pub const BACKEND_ENV: &str = "COCONUT_GUARDIAN_BACKEND";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointSettings {
    pub remote_vision_url: String,
    pub remote_vision_api_key: Option<String>,
    pub custom_model_url: String,
    pub treatment_url: String,
    pub geocoder_url: String,
    pub persistence_url: Option<String>,
    pub ip_location_url: Option<String>,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            remote_vision_url: "http://localhost:8080/api/analyze".into(),
            remote_vision_api_key: None,
            custom_model_url: "http://localhost:5000/predict".into(),
            treatment_url: "http://localhost:8080/api/treatment".into(),
            geocoder_url: "https://nominatim.openstreetmap.org/reverse".into(),
            persistence_url: Some("http://localhost/coconut-api/save_prediction.php".into()),
            ip_location_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutSettings {
    pub location_secs: u64,
    pub analysis_secs: u64,
    pub enrichment_secs: u64,
    pub mirror_secs: u64,
    pub connect_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            location_secs: 10,
            analysis_secs: 60,
            enrichment_secs: 20,
            mirror_secs: 15,
            connect_secs: 10,
        }
    }
}

impl TimeoutSettings {
    /// Upper bound for any single HTTP request; step timeouts sit below it.
    pub fn request(&self) -> Duration {
        let longest = self
            .analysis_secs
            .max(self.enrichment_secs)
            .max(self.mirror_secs)
            .max(self.location_secs);
        Duration::from_secs(longest)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn mirror(&self) -> Duration {
        Duration::from_secs(self.mirror_secs)
    }

    pub fn location(&self) -> Duration {
        Duration::from_secs(self.location_secs)
    }

    pub fn analysis(&self) -> Duration {
        Duration::from_secs(self.analysis_secs)
    }

    pub fn enrichment(&self) -> Duration {
        Duration::from_secs(self.enrichment_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppSettings {
    pub language: Language,
    pub backend: BackendKind,
    pub endpoints: EndpointSettings,
    pub timeouts: TimeoutSettings,
    pub fixed_coordinates: Option<Coordinates>,
    pub archive_path: Option<PathBuf>,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AppSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring invalid settings in {}: {err}", path.display());
                AppSettings::default()
            })
        } else {
            AppSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, AppSettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, AppSettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Stored settings with environment overrides applied.
    pub fn effective(&self) -> AppSettings {
        let mut settings = self.read().clone();

        if let Ok(code) = std::env::var(LANGUAGE_ENV) {
            settings.language = Language::from_code(&code);
        }
        if let Ok(value) = std::env::var(BACKEND_ENV) {
            match BackendKind::parse(&value) {
                Some(backend) => settings.backend = backend,
                None => warn!("Ignoring unknown {BACKEND_ENV} value '{value}'"),
            }
        }

        settings
    }

    pub fn language(&self) -> Language {
        self.read().language
    }

    pub fn update_language(&self, language: Language) -> Result<()> {
        let mut guard = self.write();
        guard.language = language;
        self.persist(&guard)
    }

    pub fn update_backend(&self, backend: BackendKind) -> Result<()> {
        let mut guard = self.write();
        guard.backend = backend;
        self.persist(&guard)
    }

    fn persist(&self, data: &AppSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
