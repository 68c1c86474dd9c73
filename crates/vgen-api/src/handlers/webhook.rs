//! Render completion webhook handler.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;
use tracing::info;

use vgen_models::JobId;

use crate::error::{ApiError, ApiResult};
use crate::services::CompletionOutcome;
use crate::state::AppState;

/// Header carrying the hex HMAC-SHA512 of the raw body.
const SIGNATURE_HEADER: &str = "X-Vgen-Signature";

/// Completion payload posted by the rendering backend.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub video_id: String,
    #[serde(default)]
    pub render_id: Option<String>,
    /// Terminal result kind reported by the backend (success/error/timeout).
    /// Any terminal report settles the job the same way.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// POST /webhook
///
/// Settles the reported job: frees its slot, sweeps its artifacts and wakes
/// the queue pollers. 404 means no slot record existed; the wake has still
/// been published by then.
pub async fn render_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    if let Some(secret) = &state.config.webhook_secret {
        verify_signature(secret, &headers, &body)?;
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid webhook payload: {}", e)))?;
    let job_id = JobId::from_string(&payload.video_id);

    info!(
        job_id = %job_id,
        render_id = payload.render_id.as_deref().unwrap_or("-"),
        kind = payload.kind.as_deref().unwrap_or("-"),
        "Render completion received"
    );

    match state.reconciler.complete(&job_id).await? {
        CompletionOutcome::Completed => Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "status": "completed" })),
        )),
        CompletionOutcome::Unknown => Err(ApiError::not_found(format!(
            "No processing record for job {}",
            job_id
        ))),
    }
}

fn verify_signature(secret: &str, headers: &HeaderMap, body: &[u8]) -> ApiResult<()> {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing webhook signature"))?;
    let provided = provided.strip_prefix("sha512=").unwrap_or(provided);

    let signature = decode_hex(provided)
        .ok_or_else(|| ApiError::unauthorized("Malformed webhook signature"))?;

    let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::internal(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(&signature)
        .map_err(|_| ApiError::unauthorized("Webhook signature mismatch"))
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
