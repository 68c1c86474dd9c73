//! Rendering backend HTTP client.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vgen_models::RenderRequest;

use crate::error::{RenderError, RenderResult};

/// Render client configuration.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Rendering backend base URL
    pub base_url: String,
    /// Composition name registered with the backend
    pub composition: String,
    /// URL the backend serves composition assets from
    pub serve_url: String,
    /// Output codec
    pub codec: String,
    /// Webhook the backend calls on completion
    pub webhook_url: String,
    /// Shared secret the backend signs webhook payloads with
    pub webhook_secret: Option<String>,
    /// Request timeout
    pub timeout: Duration,
}

impl RenderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> RenderResult<Self> {
        Ok(Self {
            base_url: std::env::var("RENDER_BASE_URL")
                .map_err(|_| RenderError::config_error("RENDER_BASE_URL not set"))?,
            composition: std::env::var("RENDER_COMPOSITION")
                .unwrap_or_else(|_| "vgen-video".to_string()),
            serve_url: std::env::var("RENDER_SERVE_URL")
                .map_err(|_| RenderError::config_error("RENDER_SERVE_URL not set"))?,
            codec: std::env::var("RENDER_CODEC").unwrap_or_else(|_| "h264".to_string()),
            webhook_url: std::env::var("WEBHOOK_URL")
                .map_err(|_| RenderError::config_error("WEBHOOK_URL not set"))?,
            webhook_secret: std::env::var("WEBHOOK_SECRET").ok(),
            timeout: Duration::from_secs(
                std::env::var("RENDER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }
}

/// Webhook reference passed along with a submission.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookRef {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// Outbound submission payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSubmission<'a> {
    pub composition: &'a str,
    pub serve_url: &'a str,
    pub codec: &'a str,
    pub webhook: &'a WebhookRef,
    pub input_props: &'a RenderRequest,
}

/// Handle returned by a successful submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderHandle {
    /// Opaque render identifier
    pub render_id: String,
    /// Bucket the backend writes the output to
    pub bucket_name: String,
}

/// Rendering backend client.
#[derive(Clone)]
pub struct RenderClient {
    http: Client,
    config: RenderConfig,
    webhook: WebhookRef,
}

impl RenderClient {
    /// Create a new client.
    pub fn new(config: RenderConfig) -> RenderResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("vgen-render/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RenderError::Unreachable(e.to_string()))?;

        let webhook = WebhookRef {
            url: config.webhook_url.clone(),
            secret: config.webhook_secret.clone(),
        };

        Ok(Self {
            http,
            config,
            webhook,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> RenderResult<Self> {
        Self::new(RenderConfig::from_env()?)
    }

    /// Submit a composed request for rendering.
    ///
    /// Completion is NOT awaited here; the backend reports it through the
    /// webhook carried in the submission.
    pub async fn submit(&self, request: &RenderRequest) -> RenderResult<RenderHandle> {
        let url = format!("{}/renders", self.config.base_url.trim_end_matches('/'));
        let submission = RenderSubmission {
            composition: &self.config.composition,
            serve_url: &self.config.serve_url,
            codec: &self.config.codec,
            webhook: &self.webhook,
            input_props: request,
        };

        debug!(job_id = %request.video_id, "Submitting render");

        let response = self
            .http
            .post(&url)
            .json(&submission)
            .send()
            .await
            .map_err(|e| RenderError::Unreachable(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => {
                let handle: RenderHandle = response
                    .json()
                    .await
                    .map_err(|e| RenderError::MalformedResponse(e.to_string()))?;
                info!(
                    job_id = %request.video_id,
                    render_id = %handle.render_id,
                    "Render submitted"
                );
                Ok(handle)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_ms = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(|secs| secs * 1000);
                Err(RenderError::RateLimited { retry_after_ms })
            }
            _ => {
                let detail = response.text().await.unwrap_or_default();
                Err(RenderError::Rejected {
                    status: status.as_u16(),
                    detail,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_models::Scene;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> RenderConfig {
        RenderConfig {
            base_url,
            composition: "vgen-video".to_string(),
            serve_url: "https://serve.example.com".to_string(),
            codec: "h264".to_string(),
            webhook_url: "https://api.example.com/webhook".to_string(),
            webhook_secret: Some("secret".to_string()),
            timeout: Duration::from_secs(5),
        }
    }

    fn request() -> RenderRequest {
        RenderRequest::new(
            "vid-1",
            vec![Scene::new(
                "https://example.com/v.mp4",
                "https://example.com/a.mp3",
            )],
        )
    }

    #[tokio::test]
    async fn submit_returns_render_handle() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/renders"))
            .and(body_partial_json(serde_json::json!({
                "composition": "vgen-video",
                "codec": "h264",
                "inputProps": { "videoId": "vid-1" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "renderId": "r-123",
                "bucketName": "render-output"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RenderClient::new(config(server.uri())).unwrap();
        let handle = client.submit(&request()).await.unwrap();

        assert_eq!(handle.render_id, "r-123");
        assert_eq!(handle.bucket_name, "render-output");
    }

    #[tokio::test]
    async fn submit_maps_429_to_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/renders"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "15"))
            .mount(&server)
            .await;

        let client = RenderClient::new(config(server.uri())).unwrap();
        let err = client.submit(&request()).await.unwrap_err();

        assert!(err.is_rate_limited());
        match err {
            RenderError::RateLimited { retry_after_ms } => {
                assert_eq!(retry_after_ms, Some(15_000));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn submit_maps_5xx_to_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/renders"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = RenderClient::new(config(server.uri())).unwrap();
        let err = client.submit(&request()).await.unwrap_err();

        match err {
            RenderError::Rejected { status, detail } => {
                assert_eq!(status, 503);
                assert_eq!(detail, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
