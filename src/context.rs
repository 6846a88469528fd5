//! Session-wide state shared by the pipeline and the language reactor.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::BackendKind,
    models::{Language, PredictionRecord},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default)]
struct ContextState {
    language: Language,
    backend: BackendKind,
    current_user: Option<UserProfile>,
    displayed_record: Option<String>,
    disease_context: Option<String>,
}

/// Created at startup, updated by sign-in/out, language and backend changes,
/// and by the orchestrator when a new result is shown.
#[derive(Clone, Default)]
pub struct AppContext {
    inner: Arc<RwLock<ContextState>>,
}

impl AppContext {
    pub fn new(language: Language, backend: BackendKind) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ContextState {
                language,
                backend,
                ..ContextState::default()
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ContextState> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, ContextState> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn language(&self) -> Language {
        self.read().language
    }

    /// Returns `true` when the language actually changed.
    pub fn set_language(&self, language: Language) -> bool {
        let mut state = self.write();
        if state.language == language {
            return false;
        }
        info!("Display language {} -> {}", state.language, language);
        state.language = language;
        true
    }

    pub fn backend(&self) -> BackendKind {
        self.read().backend
    }

    pub fn set_backend(&self, backend: BackendKind) {
        self.write().backend = backend;
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.read().current_user.clone()
    }

    pub fn sign_in(&self, user: UserProfile) {
        self.write().current_user = Some(user);
    }

    pub fn sign_out(&self) {
        let mut state = self.write();
        state.current_user = None;
        state.displayed_record = None;
        state.disease_context = None;
    }

    pub fn displayed_record(&self) -> Option<String> {
        self.read().displayed_record.clone()
    }

    pub fn show_record(&self, record: &PredictionRecord) {
        let mut state = self.write();
        state.displayed_record = Some(record.id.clone());
        state.disease_context = Some(record.disease_context());
    }

    /// Summary of the last shown result, used to seed expert searches.
    pub fn disease_context(&self) -> Option<String> {
        self.read().disease_context.clone()
    }
}
