//! S3 artifact storage.
//!
//! Render jobs stage intermediate assets (mirrored scene videos) into an
//! object bucket under a per-job prefix; the completion reconciler sweeps
//! that prefix when the rendering backend reports the job done.

pub mod cleanup;
pub mod client;
pub mod error;

pub use cleanup::{ArtifactCleaner, StorageCleaner};
pub use client::{ArtifactStore, ObjectInfo, StorageConfig};
pub use error::{StorageError, StorageResult};

/// Storage key prefix for a job's staged artifacts.
pub fn job_prefix(job_id: &str) -> String {
    format!("jobs/{}/", job_id)
}
