//! Transcription backend HTTP client.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use vgen_models::TimedCaption;

use crate::error::{TranscribeError, TranscribeResult};

/// Transcription client configuration.
#[derive(Debug, Clone)]
pub struct TranscribeConfig {
    /// Transcription backend base URL
    pub base_url: String,
    /// Request timeout; transcription of a long scene can take a while
    pub timeout: Duration,
}

impl TranscribeConfig {
    /// Create config from environment variables.
    pub fn from_env() -> TranscribeResult<Self> {
        Ok(Self {
            base_url: std::env::var("TRANSCRIBE_BASE_URL")
                .map_err(|_| TranscribeError::config_error("TRANSCRIBE_BASE_URL not set"))?,
            timeout: Duration::from_secs(
                std::env::var("TRANSCRIBE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscribeBody<'a> {
    audio_url: &'a str,
}

#[derive(Deserialize)]
struct TimedWord {
    text: String,
    #[serde(rename = "startTime")]
    start_time: f64,
    #[serde(rename = "endTime")]
    end_time: f64,
}

#[derive(Deserialize)]
struct TranscribeResponse {
    words: Vec<TimedWord>,
}

/// Transcription backend client.
#[derive(Clone)]
pub struct TranscribeClient {
    http: Client,
    config: TranscribeConfig,
}

impl TranscribeClient {
    /// Create a new client.
    pub fn new(config: TranscribeConfig) -> TranscribeResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("vgen-transcribe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TranscribeError::Unreachable(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> TranscribeResult<Self> {
        Self::new(TranscribeConfig::from_env()?)
    }

    /// Transcribe one audio track into timed captions.
    pub async fn transcribe(&self, audio_url: &str) -> TranscribeResult<Vec<TimedCaption>> {
        let url = format!(
            "{}/transcriptions",
            self.config.base_url.trim_end_matches('/')
        );

        debug!(audio_url, "Requesting transcription");

        let response = self
            .http
            .post(&url)
            .json(&TranscribeBody { audio_url })
            .send()
            .await
            .map_err(|e| TranscribeError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let detail = response.text().await.unwrap_or_default();
            return Err(TranscribeError::Failed {
                status: status.as_u16(),
                detail,
            });
        }

        let body: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::MalformedResponse(e.to_string()))?;

        Ok(body
            .words
            .into_iter()
            .map(|w| TimedCaption::new(w.text, w.start_time, w.end_time))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: String) -> TranscribeClient {
        TranscribeClient::new(TranscribeConfig {
            base_url,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn transcribe_returns_timed_captions_in_order() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/transcriptions"))
            .and(body_json(serde_json::json!({
                "audioUrl": "https://example.com/a.mp3"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "words": [
                    { "text": "hello", "startTime": 0.0, "endTime": 0.4 },
                    { "text": "world", "startTime": 0.5, "endTime": 0.9 }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let captions = client(server.uri())
            .transcribe("https://example.com/a.mp3")
            .await
            .unwrap();

        assert_eq!(captions.len(), 2);
        assert_eq!(captions[0].text, "hello");
        assert_eq!(captions[0].start_seconds, 0.0);
        assert_eq!(captions[1].text, "world");
        assert_eq!(captions[1].end_seconds, 0.9);
    }

    #[tokio::test]
    async fn transcribe_surfaces_backend_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/transcriptions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .mount(&server)
            .await;

        let err = client(server.uri())
            .transcribe("https://example.com/a.mp3")
            .await
            .unwrap_err();

        match err {
            TranscribeError::Failed { status, detail } => {
                assert_eq!(status, 500);
                assert_eq!(detail, "model crashed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
