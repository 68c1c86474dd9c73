//! Shared test doubles.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use vgen_models::{JobId, RenderRequest};
use vgen_queue::{QueueDepth, QueueMessage, QueueResult, QueueSource, WakeSignal};
use vgen_storage::{ArtifactCleaner, StorageError, StorageResult};

/// Queue double that records sends.
#[derive(Default)]
pub struct RecordingQueue {
    pub sent: Mutex<Vec<RenderRequest>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueSource for RecordingQueue {
    async fn send(&self, request: &RenderRequest) -> QueueResult<String> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(request.clone());
        Ok(format!("sent-{}", sent.len()))
    }

    async fn receive(&self, _wait: Duration) -> QueueResult<Option<QueueMessage>> {
        Ok(None)
    }

    async fn ack(&self, _message_id: &str) -> QueueResult<()> {
        Ok(())
    }

    async fn dead_letter(&self, _request: &RenderRequest, _error: &str) -> QueueResult<()> {
        Ok(())
    }

    async fn claim_pending(
        &self,
        _min_idle: Duration,
        _count: usize,
    ) -> QueueResult<Vec<QueueMessage>> {
        Ok(Vec::new())
    }

    async fn depth(&self) -> QueueResult<QueueDepth> {
        Ok(QueueDepth {
            ready: self.sent.lock().unwrap().len() as u64,
            dead: 0,
        })
    }
}

/// Wake double that records notifications.
#[derive(Default)]
pub struct RecordingWake {
    pub notified: Mutex<Vec<JobId>>,
}

impl RecordingWake {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WakeSignal for RecordingWake {
    async fn notify(&self, job_id: &JobId) -> QueueResult<()> {
        self.notified.lock().unwrap().push(job_id.clone());
        Ok(())
    }
}

/// Cleaner double that records sweeps, optionally failing every call.
#[derive(Default)]
pub struct RecordingCleaner {
    pub swept: Mutex<Vec<(String, Vec<String>)>>,
    fail: bool,
}

impl RecordingCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            swept: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

#[async_trait]
impl ArtifactCleaner for RecordingCleaner {
    async fn cleanup_job(&self, job_id: &str, tracked_keys: &[String]) -> StorageResult<u32> {
        if self.fail {
            return Err(StorageError::delete_failed("simulated failure"));
        }
        self.swept
            .lock()
            .unwrap()
            .push((job_id.to_string(), tracked_keys.to_vec()));
        Ok(tracked_keys.len() as u32)
    }
}
