//! Artifact cleanup after job completion.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::client::ArtifactStore;
use crate::error::StorageResult;
use crate::job_prefix;

/// Deletes a completed job's intermediate artifacts.
///
/// Implementations must be idempotent: sweeping a job that has nothing
/// stored is a successful no-op.
#[async_trait]
pub trait ArtifactCleaner: Send + Sync {
    /// Delete `tracked_keys` plus everything under the job's storage
    /// prefix. Returns the number of objects deleted.
    async fn cleanup_job(&self, job_id: &str, tracked_keys: &[String]) -> StorageResult<u32>;
}

/// S3-backed cleaner.
pub struct StorageCleaner {
    store: ArtifactStore,
}

impl StorageCleaner {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ArtifactCleaner for StorageCleaner {
    async fn cleanup_job(&self, job_id: &str, tracked_keys: &[String]) -> StorageResult<u32> {
        let prefix = job_prefix(job_id);

        // Listing pages through every continuation token; anything the
        // tracked set missed (partial submission attempts) still gets swept.
        let listed = self.store.list_by_prefix(&prefix).await?;

        let mut keys: Vec<String> = tracked_keys.to_vec();
        for obj in listed {
            if !keys.contains(&obj.key) {
                keys.push(obj.key);
            }
        }

        if keys.is_empty() {
            info!(job_id, "No artifacts to clean up");
            return Ok(0);
        }

        let deleted = self.store.delete_keys(&keys).await?;
        if deleted as usize != keys.len() {
            warn!(job_id, deleted, expected = keys.len(), "Partial artifact cleanup");
        }
        Ok(deleted)
    }
}
