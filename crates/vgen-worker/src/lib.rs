//! Render job worker.
//!
//! Pulls deferred render requests off the queue, admits them against the
//! concurrency ceiling, composes captions, stages artifacts, submits to the
//! rendering backend and retries failures with exponential backoff. The
//! slot a submitted job holds is released by the API's completion webhook,
//! which also wakes the pollers here.

pub mod admission;
pub mod backoff;
pub mod captions;
pub mod config;
pub mod error;
pub mod mirror;
pub mod pipeline;
pub mod poller;

#[cfg(test)]
pub(crate) mod testutil;

/// Metric names recorded by the worker.
pub mod metric {
    pub const JOBS_SUBMITTED_TOTAL: &str = "vgen_jobs_submitted_total";
    pub const JOBS_DEFERRED_TOTAL: &str = "vgen_jobs_deferred_total";
    pub const JOBS_RETRIED_TOTAL: &str = "vgen_jobs_retried_total";
    pub const JOBS_FAILED_TOTAL: &str = "vgen_jobs_failed_total";
    pub const JOBS_DUPLICATE_TOTAL: &str = "vgen_jobs_duplicate_total";
    pub const SLOTS_IN_USE: &str = "vgen_slots_in_use";
    pub const SLOTS_STUCK: &str = "vgen_slots_stuck";
}

pub use admission::{AdmissionController, AdmitDecision};
pub use backoff::{submission_retry_delay, BackoffPolicy, IdleBackoff};
pub use captions::CaptionComposer;
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use mirror::ArtifactMirror;
pub use pipeline::{PipelineOutcome, RetrySettings, SubmissionPipeline};
pub use poller::QueuePoller;
