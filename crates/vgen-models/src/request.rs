//! Render request definitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::scene::Scene;

/// Unique identifier for a render job.
///
/// Externally supplied (`videoId` on the wire), immutable once assigned,
/// and used as the idempotency key throughout the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

fn default_border_color() -> String {
    "#000000".to_string()
}

fn default_fill_color() -> String {
    "#ffffff".to_string()
}

fn default_layout() -> String {
    "horizontal".to_string()
}

fn default_caption() -> bool {
    true
}

/// One end-to-end video-generation request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    /// Job identifier, supplied by the caller
    #[validate(length(min = 1, message = "videoId must not be empty"))]
    #[serde(rename = "videoId")]
    pub video_id: String,

    /// Ordered scene list; order maps to the render timeline
    #[validate(length(min = 1, message = "No scenes provided"))]
    #[validate(nested)]
    pub scenes: Vec<Scene>,

    /// Whether scene audio should be transcribed into captions
    #[serde(default = "default_caption")]
    pub caption: bool,

    /// Optional caption font
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_url: Option<String>,

    /// Caption border color
    #[serde(default = "default_border_color")]
    pub border_color: String,

    /// Caption fill color
    #[serde(default = "default_fill_color")]
    pub fill_color: String,

    /// Scene layout
    #[serde(default = "default_layout")]
    pub layout: String,
}

impl RenderRequest {
    /// Create a request with default styling.
    pub fn new(video_id: impl Into<String>, scenes: Vec<Scene>) -> Self {
        Self {
            video_id: video_id.into(),
            scenes,
            caption: default_caption(),
            font_url: None,
            border_color: default_border_color(),
            fill_color: default_fill_color(),
            layout: default_layout(),
        }
    }

    /// The request's job id.
    pub fn job_id(&self) -> JobId {
        JobId::from_string(&self.video_id)
    }

    /// Disable caption generation.
    pub fn without_captions(mut self) -> Self {
        self.caption = false;
        self
    }
}
