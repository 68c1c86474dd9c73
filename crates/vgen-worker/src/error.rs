//! Worker error types.

use std::time::Duration;

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Store error: {0}")]
    Store(#[from] vgen_store::StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] vgen_queue::QueueError),

    #[error("Storage error: {0}")]
    Storage(#[from] vgen_storage::StorageError),

    #[error("Render error: {0}")]
    Render(#[from] vgen_render::RenderError),

    #[error("Transcription error: {0}")]
    Transcription(#[from] vgen_transcribe::TranscribeError),

    #[error("Artifact mirror failed: {0}")]
    Mirror(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl WorkerError {
    pub fn mirror(msg: impl Into<String>) -> Self {
        Self::Mirror(msg.into())
    }

    /// Whether the rendering backend throttled this attempt.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, WorkerError::Render(e) if e.is_rate_limited())
    }

    /// Server-suggested retry delay, if the backend sent one.
    pub fn rate_limit_hint(&self) -> Option<Duration> {
        match self {
            WorkerError::Render(vgen_render::RenderError::RateLimited {
                retry_after_ms: Some(ms),
            }) => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}
