//! Slot admission.

use std::sync::Arc;

use tracing::{debug, info};

use vgen_models::{JobId, JobRecord, RenderRequest};
use vgen_queue::QueueSource;
use vgen_store::{Admission, SlotStore};

use crate::error::WorkerResult;
use crate::metric;

/// Outcome of trying to admit one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitDecision {
    /// A slot is reserved; the caller owns it until release.
    Admitted,
    /// All slots were taken; the request is back on the deferred queue.
    Deferred,
    /// Another delivery of the same job id already holds a slot.
    Duplicate,
}

/// Guards the concurrency ceiling in front of the submission pipeline.
///
/// Admission is the only path that inserts into the slot ledger, and it
/// defers rather than blocks: a request that finds every slot taken goes
/// straight back onto the queue.
pub struct AdmissionController {
    store: Arc<dyn SlotStore>,
    queue: Arc<dyn QueueSource>,
    limit: u64,
}

impl AdmissionController {
    pub fn new(store: Arc<dyn SlotStore>, queue: Arc<dyn QueueSource>, limit: u64) -> Self {
        Self {
            store,
            queue,
            limit,
        }
    }

    /// Try to reserve a slot for `request`.
    pub async fn admit(&self, request: &RenderRequest) -> WorkerResult<AdmitDecision> {
        let record = JobRecord::new(request.job_id());

        match self.store.try_admit(record, self.limit).await? {
            Admission::Admitted => {
                let in_use = self.store.count().await?;
                metrics::gauge!(metric::SLOTS_IN_USE).set(in_use as f64);
                info!(
                    job_id = %request.video_id,
                    slots_in_use = in_use,
                    limit = self.limit,
                    "Job admitted"
                );
                Ok(AdmitDecision::Admitted)
            }
            Admission::LimitReached => {
                self.queue.send(request).await?;
                metrics::counter!(metric::JOBS_DEFERRED_TOTAL).increment(1);
                info!(job_id = %request.video_id, "All slots taken; request deferred");
                Ok(AdmitDecision::Deferred)
            }
            Admission::AlreadyAdmitted => {
                metrics::counter!(metric::JOBS_DUPLICATE_TOTAL).increment(1);
                debug!(job_id = %request.video_id, "Duplicate delivery for an admitted job");
                Ok(AdmitDecision::Duplicate)
            }
        }
    }

    /// Release a slot reserved by `admit`. Idempotent.
    pub async fn release(&self, job_id: &JobId) -> WorkerResult<()> {
        let removed = self.store.remove(job_id).await?;
        if removed > 0 {
            let in_use = self.store.count().await?;
            metrics::gauge!(metric::SLOTS_IN_USE).set(in_use as f64);
            debug!(job_id = %job_id, "Slot released");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::RecordingQueue;
    use vgen_models::Scene;
    use vgen_store::MemorySlotStore;

    fn request(id: &str) -> RenderRequest {
        RenderRequest::new(
            id,
            vec![Scene::new("https://e.com/v.mp4", "https://e.com/a.mp3")],
        )
    }

    #[tokio::test]
    async fn second_job_is_deferred_until_the_first_releases() {
        let store = Arc::new(MemorySlotStore::new());
        let queue = Arc::new(RecordingQueue::new());
        let admission = AdmissionController::new(store.clone(), queue.clone(), 1);

        assert_eq!(
            admission.admit(&request("j1")).await.unwrap(),
            AdmitDecision::Admitted
        );
        assert_eq!(
            admission.admit(&request("j2")).await.unwrap(),
            AdmitDecision::Deferred
        );
        assert_eq!(queue.sent.lock().unwrap().len(), 1);
        assert_eq!(queue.sent.lock().unwrap()[0].video_id, "j2");

        // Completion frees the slot; the deferred job now fits.
        store.find_and_remove(&JobId::from("j1")).await.unwrap();
        assert_eq!(
            admission.admit(&request("j2")).await.unwrap(),
            AdmitDecision::Admitted
        );
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_delivery_does_not_requeue() {
        let store = Arc::new(MemorySlotStore::new());
        let queue = Arc::new(RecordingQueue::new());
        let admission = AdmissionController::new(store.clone(), queue.clone(), 2);

        assert_eq!(
            admission.admit(&request("j1")).await.unwrap(),
            AdmitDecision::Admitted
        );
        assert_eq!(
            admission.admit(&request("j1")).await.unwrap(),
            AdmitDecision::Duplicate
        );
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(queue.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let store = Arc::new(MemorySlotStore::new());
        let queue = Arc::new(RecordingQueue::new());
        let admission = AdmissionController::new(store.clone(), queue, 1);

        admission.admit(&request("j1")).await.unwrap();
        admission.release(&JobId::from("j1")).await.unwrap();
        admission.release(&JobId::from("j1")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
