use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use log::{error, info, warn};
use serde::Serialize;
use tokio::{runtime::Handle, task::JoinHandle};

use crate::models::PredictionRecord;

use super::HistoryMirror;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub total: usize,
    pub healthy: usize,
    pub diseased: usize,
    pub needs_referral: usize,
    pub by_disease: BTreeMap<String, usize>,
}

/// Session history, newest first. Appending is the only structural change;
/// enrichment fields of an appended record may be refreshed in place.
#[derive(Clone)]
pub struct HistoryStore {
    records: Arc<RwLock<Vec<PredictionRecord>>>,
    mirrors: Arc<Vec<Arc<dyn HistoryMirror>>>,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
    mirror_timeout: Duration,
}

const DEFAULT_MIRROR_TIMEOUT: Duration = Duration::from_secs(15);

fn lock_pending(pending: &Mutex<Vec<JoinHandle<()>>>) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
    match pending.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl HistoryStore {
    pub fn new(mirrors: Vec<Arc<dyn HistoryMirror>>) -> Self {
        Self::with_records(Vec::new(), mirrors)
    }

    /// Seeds the log, e.g. from the local archive. `records` must be newest first.
    pub fn with_records(records: Vec<PredictionRecord>, mirrors: Vec<Arc<dyn HistoryMirror>>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
            mirrors: Arc::new(mirrors),
            pending: Arc::new(Mutex::new(Vec::new())),
            mirror_timeout: DEFAULT_MIRROR_TIMEOUT,
        }
    }

    /// Bounds each mirror delivery; an elapsed delivery is logged and dropped.
    pub fn with_mirror_timeout(mut self, timeout: Duration) -> Self {
        self.mirror_timeout = timeout;
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<PredictionRecord>> {
        match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<PredictionRecord>> {
        match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Prepends `record` and dispatches mirroring in the background.
    /// Returns `false` if a record with the same id is already present.
    pub fn append(&self, record: PredictionRecord) -> bool {
        {
            let mut records = self.write();
            if records.iter().any(|existing| existing.id == record.id) {
                warn!("Record {} already in history; ignoring append", record.id);
                return false;
            }
            records.insert(0, record.clone());
        }
        info!("Record {} appended to history", record.id);

        self.dispatch_mirrors(record);
        true
    }

    fn dispatch_mirrors(&self, record: PredictionRecord) {
        if self.mirrors.is_empty() {
            return;
        }

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available; skipping mirroring for {}", record.id);
                return;
            }
        };

        // One task per mirror so a stalled destination cannot hold back the others.
        let mut pending = lock_pending(&self.pending);
        pending.retain(|handle| !handle.is_finished());
        for mirror in self.mirrors.iter() {
            let mirror = Arc::clone(mirror);
            let record = record.clone();
            let timeout = self.mirror_timeout;
            pending.push(runtime.spawn(async move {
                match tokio::time::timeout(timeout, mirror.mirror(&record)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => error!(
                        "Failed to mirror record {} to {}: {err:#}",
                        record.id,
                        mirror.name()
                    ),
                    Err(_) => error!(
                        "Mirroring record {} to {} timed out after {timeout:?}",
                        record.id,
                        mirror.name()
                    ),
                }
            }));
        }
    }

    /// Waits up to `timeout` for in-flight mirror tasks, e.g. before exit.
    /// Returns how many were still running when the wait ended.
    pub async fn flush_mirrors(&self, timeout: Duration) -> usize {
        let tasks: Vec<JoinHandle<()>> = lock_pending(&self.pending).drain(..).collect();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut unfinished = 0;

        for task in tasks {
            match tokio::time::timeout_at(deadline, task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!("Mirror task panicked: {err}"),
                Err(_) => unfinished += 1,
            }
        }

        unfinished
    }

    /// Overwrites the treatment of an appended record. Returns `false` if unknown.
    pub fn update_treatment(&self, id: &str, treatment: Option<String>) -> bool {
        let mut records = self.write();
        match records.iter_mut().find(|record| record.id == id) {
            Some(record) => {
                record.treatment = treatment;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<PredictionRecord> {
        self.read().iter().find(|record| record.id == id).cloned()
    }

    pub fn records(&self) -> Vec<PredictionRecord> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn summary(&self) -> HistorySummary {
        let records = self.read();
        let mut summary = HistorySummary {
            total: records.len(),
            ..HistorySummary::default()
        };

        for record in records.iter() {
            if record.is_healthy {
                summary.healthy += 1;
            } else {
                summary.diseased += 1;
                *summary
                    .by_disease
                    .entry(record.disease_type.clone())
                    .or_default() += 1;
            }
            if record.needs_expert_referral() {
                summary.needs_referral += 1;
            }
        }

        summary
    }
}
