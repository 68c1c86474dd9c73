//! Caption composition via the transcription backend.

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use vgen_models::{RenderRequest, TimedCaption};
use vgen_transcribe::TranscribeClient;

use crate::error::WorkerResult;

/// Transcribes every scene of a captioned request.
///
/// Scenes are fanned out with bounded parallelism, but results are applied
/// in scene order so the caption lists line up with the render timeline.
/// One failed scene fails the whole composition; a request never renders
/// with a partial caption set.
pub struct CaptionComposer {
    client: TranscribeClient,
    parallel: usize,
}

impl CaptionComposer {
    pub fn new(client: TranscribeClient, parallel: usize) -> Self {
        Self {
            client,
            parallel: parallel.max(1),
        }
    }

    /// Produce a copy of `request` with transcription captions attached to
    /// every scene.
    pub async fn compose(&self, request: &RenderRequest) -> WorkerResult<RenderRequest> {
        let mut composed = request.clone();

        debug!(
            job_id = %request.video_id,
            scenes = composed.scenes.len(),
            parallel = self.parallel,
            "Transcribing scenes"
        );

        let transcriptions: Vec<_> = composed
            .scenes
            .iter()
            .map(|scene| {
                let client = self.client.clone();
                let audio_url = scene.audio_url.clone();
                async move { client.transcribe(&audio_url).await }
            })
            .collect();
        let captions: Vec<Vec<TimedCaption>> = stream::iter(transcriptions)
            .buffered(self.parallel)
            .try_collect()
            .await?;

        for (scene, words) in composed.scenes.iter_mut().zip(captions) {
            scene.captions = Some(words);
        }

        info!(job_id = %request.video_id, "Captions composed");
        Ok(composed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vgen_models::Scene;
    use vgen_transcribe::TranscribeConfig;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn composer(base_url: String, parallel: usize) -> CaptionComposer {
        let client = TranscribeClient::new(TranscribeConfig {
            base_url,
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        CaptionComposer::new(client, parallel)
    }

    fn request() -> RenderRequest {
        RenderRequest::new(
            "vid-1",
            vec![
                Scene::new("https://e.com/v1.mp4", "https://e.com/a1.mp3"),
                Scene::new("https://e.com/v2.mp4", "https://e.com/a2.mp3"),
            ],
        )
    }

    fn words(text: &str) -> serde_json::Value {
        serde_json::json!({
            "words": [{ "text": text, "startTime": 0.0, "endTime": 0.5 }]
        })
    }

    #[tokio::test]
    async fn captions_land_in_scene_order_despite_uneven_latency() {
        let server = MockServer::start().await;

        // The first scene's transcription finishes last; its captions must
        // still land on the first scene.
        Mock::given(method("POST"))
            .and(path("/transcriptions"))
            .and(body_json(serde_json::json!({ "audioUrl": "https://e.com/a1.mp3" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(words("first"))
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/transcriptions"))
            .and(body_json(serde_json::json!({ "audioUrl": "https://e.com/a2.mp3" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(words("second")))
            .mount(&server)
            .await;

        let composed = composer(server.uri(), 2).compose(&request()).await.unwrap();

        let first = composed.scenes[0].captions.as_ref().unwrap();
        let second = composed.scenes[1].captions.as_ref().unwrap();
        assert_eq!(first[0].text, "first");
        assert_eq!(second[0].text, "second");
    }

    #[tokio::test]
    async fn one_failed_scene_fails_the_whole_composition() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/transcriptions"))
            .and(body_json(serde_json::json!({ "audioUrl": "https://e.com/a1.mp3" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(words("first")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/transcriptions"))
            .and(body_json(serde_json::json!({ "audioUrl": "https://e.com/a2.mp3" })))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .mount(&server)
            .await;

        let err = composer(server.uri(), 2).compose(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::WorkerError::Transcription(_)
        ));
    }
}
