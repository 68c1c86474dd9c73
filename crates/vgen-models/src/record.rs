//! Slot-ledger job records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::request::JobId;

/// Status of a job occupying a concurrency slot.
///
/// Terminal jobs have no record at all, so `Processing` is the only
/// status a live record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Processing,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
        }
    }
}

/// Durable record of a job currently occupying a concurrency slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job identifier (idempotency key)
    pub job_id: JobId,

    /// Job status
    #[serde(default)]
    pub status: JobStatus,

    /// Storage keys created while processing this job; consumed at cleanup
    #[serde(default)]
    pub artifact_keys: Vec<String>,

    /// When the job was admitted to a slot
    pub admitted_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a fresh `processing` record.
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Processing,
            artifact_keys: Vec::new(),
            admitted_at: Utc::now(),
        }
    }

    /// Age of the record.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.admitted_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serde_roundtrip() {
        let record = JobRecord::new(JobId::from("vid-1"));
        let json = serde_json::to_string(&record).unwrap();
        let decoded: JobRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.job_id, record.job_id);
        assert_eq!(decoded.status, JobStatus::Processing);
        assert!(decoded.artifact_keys.is_empty());
    }
}
