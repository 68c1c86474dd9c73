//! Completion reconciliation.

use std::sync::Arc;

use tracing::{info, warn};

use vgen_models::JobId;
use vgen_queue::WakeSignal;
use vgen_storage::ArtifactCleaner;
use vgen_store::SlotStore;

use crate::error::ApiResult;
use crate::metrics;

/// What a completion webhook resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The job held a slot; the slot is now free.
    Completed,
    /// No slot record existed. Duplicate webhook, a job that never
    /// admitted, or a record lost out-of-band.
    Unknown,
}

/// Applies a render completion to the slot ledger.
///
/// Completion is the only path that frees a slot in normal operation, so
/// the wake is published on every webhook, known job or not: if the ledger
/// drifted, the pollers should still get the chance to advance the queue.
pub struct Reconciler {
    store: Arc<dyn SlotStore>,
    cleaner: Option<Arc<dyn ArtifactCleaner>>,
    wake: Arc<dyn WakeSignal>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn SlotStore>,
        cleaner: Option<Arc<dyn ArtifactCleaner>>,
        wake: Arc<dyn WakeSignal>,
    ) -> Self {
        Self {
            store,
            cleaner,
            wake,
        }
    }

    /// Settle one completed job: free its slot, sweep its artifacts, wake
    /// the pollers. Idempotent; a second call for the same job resolves
    /// `Unknown`.
    pub async fn complete(&self, job_id: &JobId) -> ApiResult<CompletionOutcome> {
        let record = self.store.find_and_remove(job_id).await?;

        let outcome = match record {
            Some(record) => {
                info!(
                    job_id = %job_id,
                    held_seconds = record.age().num_seconds(),
                    "Job completed; slot released"
                );
                metrics::record_job_completed();

                // Cleanup failures leave orphaned objects, never a held
                // slot; the completion itself must not fail on them.
                if let Some(cleaner) = &self.cleaner {
                    match cleaner
                        .cleanup_job(job_id.as_str(), &record.artifact_keys)
                        .await
                    {
                        Ok(deleted) => metrics::record_artifacts_deleted(deleted),
                        Err(e) => {
                            warn!(job_id = %job_id, error = %e, "Artifact cleanup failed")
                        }
                    }
                }

                CompletionOutcome::Completed
            }
            None => {
                metrics::record_unknown_webhook();
                warn!(job_id = %job_id, "Completion for a job with no slot record");
                CompletionOutcome::Unknown
            }
        };

        if let Err(e) = self.wake.notify(job_id).await {
            warn!(job_id = %job_id, error = %e, "Wake publish failed");
        }

        Ok(outcome)
    }
}
