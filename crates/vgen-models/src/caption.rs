//! Timed captions.

use serde::{Deserialize, Serialize};

/// One transcribed word with its position on the timeline.
///
/// Wire format matches the scene schema: `startInSeconds` / `endInSeconds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedCaption {
    /// Caption text (usually a single word)
    pub text: String,
    /// Start offset within the scene, in seconds
    #[serde(rename = "startInSeconds")]
    pub start_seconds: f64,
    /// End offset within the scene, in seconds
    #[serde(rename = "endInSeconds")]
    pub end_seconds: f64,
}

impl TimedCaption {
    pub fn new(text: impl Into<String>, start_seconds: f64, end_seconds: f64) -> Self {
        Self {
            text: text.into(),
            start_seconds,
            end_seconds,
        }
    }
}
