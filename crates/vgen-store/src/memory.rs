//! In-memory slot store.
//!
//! Same semantics as the Redis store, held in a process-local map. Intended
//! for tests and local development only: durable state is the single source
//! of truth in production, and an in-memory ledger does not survive a
//! restart.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use vgen_models::{JobId, JobRecord};

use crate::error::StoreResult;
use crate::store::{Admission, SlotStore};

/// In-process slot store.
#[derive(Clone, Default)]
pub struct MemorySlotStore {
    records: Arc<Mutex<HashMap<String, JobRecord>>>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SlotStore for MemorySlotStore {
    async fn try_admit(&self, record: JobRecord, limit: u64) -> StoreResult<Admission> {
        let mut records = self.records.lock().await;

        if records.contains_key(record.job_id.as_str()) {
            return Ok(Admission::AlreadyAdmitted);
        }
        if records.len() as u64 >= limit {
            return Ok(Admission::LimitReached);
        }

        records.insert(record.job_id.as_str().to_string(), record);
        Ok(Admission::Admitted)
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.records.lock().await.len() as u64)
    }

    async fn remove(&self, job_id: &JobId) -> StoreResult<u64> {
        let mut records = self.records.lock().await;
        Ok(records.remove(job_id.as_str()).map(|_| 1).unwrap_or(0))
    }

    async fn find_and_remove(&self, job_id: &JobId) -> StoreResult<Option<JobRecord>> {
        let mut records = self.records.lock().await;
        Ok(records.remove(job_id.as_str()))
    }

    async fn add_artifacts(&self, job_id: &JobId, keys: &[String]) -> StoreResult<()> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(job_id.as_str()) {
            record.artifact_keys.extend(keys.iter().cloned());
        }
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<JobRecord>> {
        Ok(self.records.lock().await.values().cloned().collect())
    }
}
