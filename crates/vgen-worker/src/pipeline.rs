//! Submission pipeline: admission, composition and render hand-off.

use std::sync::Arc;

use tracing::{error, info, warn};

use vgen_models::RenderRequest;
use vgen_queue::QueueSource;
use vgen_render::{RenderClient, RenderHandle};
use vgen_store::SlotStore;

use crate::admission::{AdmissionController, AdmitDecision};
use crate::backoff::{submission_retry_delay, BackoffPolicy};
use crate::captions::CaptionComposer;
use crate::error::{WorkerError, WorkerResult};
use crate::metric;
use crate::mirror::ArtifactMirror;

/// Retry policy for failed submission attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    pub rate_limit_floor: std::time::Duration,
}

/// Terminal outcome of processing one queue delivery.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The rendering backend accepted the job. The slot stays held until
    /// the completion webhook releases it.
    Submitted(RenderHandle),
    /// No slot was free; the request went back onto the deferred queue.
    Deferred,
    /// Another delivery of this job id already holds a slot.
    Duplicate,
    /// Every attempt failed. The slot is released and the request is
    /// recorded on the dead-letter stream.
    Failed(WorkerError),
}

/// Drives one request from admission through render submission.
///
/// Each attempt holds a slot only while it is actively working: a failed
/// attempt releases its slot before backing off, so other jobs can run
/// during the wait, and re-admits when it retries.
pub struct SubmissionPipeline {
    admission: AdmissionController,
    store: Arc<dyn SlotStore>,
    queue: Arc<dyn QueueSource>,
    render: RenderClient,
    captions: Option<CaptionComposer>,
    mirror: Option<ArtifactMirror>,
    retry: RetrySettings,
}

impl SubmissionPipeline {
    pub fn new(
        store: Arc<dyn SlotStore>,
        queue: Arc<dyn QueueSource>,
        render: RenderClient,
        captions: Option<CaptionComposer>,
        mirror: Option<ArtifactMirror>,
        concurrency_limit: u64,
        retry: RetrySettings,
    ) -> Self {
        let admission = AdmissionController::new(store.clone(), queue.clone(), concurrency_limit);
        Self {
            admission,
            store,
            queue,
            render,
            captions,
            mirror,
            retry,
        }
    }

    /// Process one delivered request to a terminal outcome.
    ///
    /// An `Err` here means shared infrastructure (store or queue) failed
    /// mid-flight; the caller should leave the delivery unacked so the
    /// pending-claim pass picks it up again.
    pub async fn process(&self, request: &RenderRequest) -> WorkerResult<PipelineOutcome> {
        let job_id = request.job_id();
        let mut attempt: u32 = 0;

        loop {
            match self.admission.admit(request).await? {
                AdmitDecision::Admitted => {}
                AdmitDecision::Deferred => {
                    if attempt > 0 {
                        info!(
                            job_id = %job_id,
                            attempt,
                            "Slot taken during retry wait; request re-deferred"
                        );
                    }
                    return Ok(PipelineOutcome::Deferred);
                }
                AdmitDecision::Duplicate => return Ok(PipelineOutcome::Duplicate),
            }

            match self.attempt(request).await {
                Ok(handle) => {
                    metrics::counter!(metric::JOBS_SUBMITTED_TOTAL).increment(1);
                    info!(
                        job_id = %job_id,
                        render_id = %handle.render_id,
                        attempt,
                        "Render submitted; slot held until completion"
                    );
                    return Ok(PipelineOutcome::Submitted(handle));
                }
                Err(err) => {
                    // Free the slot before sleeping so other jobs can run
                    // while this one backs off.
                    self.admission.release(&job_id).await?;

                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        error!(
                            job_id = %job_id,
                            attempts = attempt,
                            error = %err,
                            "Submission attempts exhausted; dead-lettering"
                        );
                        metrics::counter!(metric::JOBS_FAILED_TOTAL).increment(1);
                        if let Err(dlq_err) =
                            self.queue.dead_letter(request, &err.to_string()).await
                        {
                            error!(job_id = %job_id, error = %dlq_err, "Dead-letter write failed");
                        }
                        return Ok(PipelineOutcome::Failed(err));
                    }

                    let delay = submission_retry_delay(
                        &self.retry.backoff,
                        attempt - 1,
                        err.is_rate_limited(),
                        self.retry.rate_limit_floor,
                        err.rate_limit_hint(),
                    );
                    warn!(
                        job_id = %job_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        rate_limited = err.is_rate_limited(),
                        error = %err,
                        "Submission attempt failed; backing off"
                    );
                    metrics::counter!(metric::JOBS_RETRIED_TOTAL).increment(1);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// One submission attempt: compose captions, stage artifacts, submit.
    async fn attempt(&self, request: &RenderRequest) -> WorkerResult<RenderHandle> {
        let mut composed = match &self.captions {
            Some(composer) if request.caption => composer.compose(request).await?,
            _ => request.clone(),
        };

        if let Some(mirror) = &self.mirror {
            let staged = mirror.stage(&mut composed).await?;
            if !staged.is_empty() {
                self.store.add_artifacts(&request.job_id(), &staged).await?;
            }
        }

        Ok(self.render.submit(&composed).await?)
    }
}
