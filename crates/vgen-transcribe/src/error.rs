//! Transcription client error types.

use thiserror::Error;

pub type TranscribeResult<T> = Result<T, TranscribeError>;

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("Transcription failed ({status}): {detail}")]
    Failed { status: u16, detail: String },

    #[error("Transcription backend unreachable: {0}")]
    Unreachable(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl TranscribeError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
