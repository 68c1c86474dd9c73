//! Scene definitions.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::caption::TimedCaption;

/// One segment of a render request's timeline.
///
/// Scene order inside a request is meaningful (it maps to the render
/// timeline) and must be preserved end-to-end.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    /// Video clip URL
    #[validate(url(message = "videoUrl must be a valid URL"))]
    pub video_url: String,

    /// Audio track URL
    #[validate(url(message = "audioUrl must be a valid URL"))]
    pub audio_url: String,

    /// Optional padding between scenes, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<f64>,

    /// Timed captions. Caller-supplied captions are replaced by
    /// transcription output when the request asks for captions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captions: Option<Vec<TimedCaption>>,
}

impl Scene {
    pub fn new(video_url: impl Into<String>, audio_url: impl Into<String>) -> Self {
        Self {
            video_url: video_url.into(),
            audio_url: audio_url.into(),
            padding: None,
            captions: None,
        }
    }

    /// Set padding.
    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = Some(padding);
        self
    }

    /// Replace the caption list.
    pub fn with_captions(mut self, captions: Vec<TimedCaption>) -> Self {
        self.captions = Some(captions);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_rejects_invalid_urls() {
        let scene = Scene::new("not a url", "https://example.com/audio.mp3");
        assert!(scene.validate().is_err());

        let scene = Scene::new(
            "https://example.com/video.mp4",
            "https://example.com/audio.mp3",
        );
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn scene_serde_roundtrip() {
        let scene = Scene::new(
            "https://example.com/video.mp4",
            "https://example.com/audio.mp3",
        )
        .with_padding(0.5)
        .with_captions(vec![TimedCaption::new("hi", 0.0, 0.4)]);

        let json = serde_json::to_string(&scene).unwrap();
        assert!(json.contains("\"videoUrl\""));
        assert!(json.contains("\"audioUrl\""));

        let decoded: Scene = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.video_url, scene.video_url);
        assert_eq!(decoded.padding, Some(0.5));
        assert_eq!(decoded.captions.unwrap().len(), 1);
    }
}
