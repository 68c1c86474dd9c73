//! The slot store trait.

use async_trait::async_trait;

use vgen_models::{JobId, JobRecord};

use crate::error::StoreResult;

/// Outcome of an admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was reserved; the caller must eventually release it.
    Admitted,
    /// All slots are occupied.
    LimitReached,
    /// A record with this job id already holds a slot. Admission is
    /// idempotent per job id, so duplicate deliveries land here.
    AlreadyAdmitted,
}

/// Durable record of jobs currently occupying a concurrency slot.
///
/// Implementations must make `try_admit` atomic with respect to the count
/// check: two concurrent admits at `count == limit - 1` may not both succeed.
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Atomically check the slot count against `limit` and insert `record`
    /// if a slot is free.
    async fn try_admit(&self, record: JobRecord, limit: u64) -> StoreResult<Admission>;

    /// Number of jobs currently holding a slot.
    async fn count(&self) -> StoreResult<u64>;

    /// Release a slot. Idempotent; returns the number of records removed
    /// (0 or 1).
    async fn remove(&self, job_id: &JobId) -> StoreResult<u64>;

    /// Look up and remove a record in one step. `None` means the record was
    /// already gone (duplicate or stale release).
    async fn find_and_remove(&self, job_id: &JobId) -> StoreResult<Option<JobRecord>>;

    /// Append artifact keys to a live record. A no-op if the record no
    /// longer exists (the job completed while artifacts were being staged).
    async fn add_artifacts(&self, job_id: &JobId, keys: &[String]) -> StoreResult<()>;

    /// Snapshot of all live records, for stuck-slot detection.
    async fn list(&self) -> StoreResult<Vec<JobRecord>>;
}
