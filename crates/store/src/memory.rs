//! In-memory [`JobStore`] backed by a mutex-guarded map.
//!
//! Each entry pairs the record with a `watch` channel; holding the map
//! lock across apply-and-notify guarantees subscribers observe patches
//! in the exact order they were applied.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use vitrine_core::types::JobId;

use crate::error::StoreError;
use crate::job::{JobPatch, JobRecord, JobStore, PatchOutcome};

struct Entry {
    record: JobRecord,
    tx: watch::Sender<JobRecord>,
}

/// In-memory [`JobStore`] used by tests and the default server.
#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<HashMap<JobId, Entry>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs (test helper).
    pub fn len(&self) -> usize {
        self.inner.lock().expect("job store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, record: JobRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("job store poisoned");
        if inner.contains_key(&record.id) {
            return Err(StoreError::DuplicateJob(record.id));
        }
        debug!(job_id = %record.id, kind = %record.kind, "Job record created");
        let (tx, _rx) = watch::channel(record.clone());
        inner.insert(record.id, Entry { record, tx });
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        let inner = self.inner.lock().expect("job store poisoned");
        Ok(inner.get(&id).map(|e| e.record.clone()))
    }

    async fn patch(&self, id: JobId, patch: JobPatch) -> Result<PatchOutcome, StoreError> {
        let mut inner = self.inner.lock().expect("job store poisoned");
        let entry = inner.get_mut(&id).ok_or(StoreError::JobNotFound(id))?;
        if entry.record.status.is_terminal() {
            return Err(StoreError::TerminalJob(id));
        }
        let replaced_asset = entry.record.apply(patch)?;
        entry.tx.send_replace(entry.record.clone());
        Ok(PatchOutcome {
            record: entry.record.clone(),
            replaced_asset,
        })
    }

    async fn subscribe(&self, id: JobId) -> Result<watch::Receiver<JobRecord>, StoreError> {
        let inner = self.inner.lock().expect("job store poisoned");
        let entry = inner.get(&id).ok_or(StoreError::JobNotFound(id))?;
        Ok(entry.tx.subscribe())
    }
}
