//! Render client error types.

use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Rate limited by rendering backend")]
    RateLimited {
        /// Server-suggested wait, from Retry-After, if present
        retry_after_ms: Option<u64>,
    },

    #[error("Submission rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Rendering backend unreachable: {0}")]
    Unreachable(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl RenderError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// True for the distinguished rate-limit rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RenderError::RateLimited { .. })
    }
}
