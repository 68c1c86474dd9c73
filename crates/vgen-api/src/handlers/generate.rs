//! Job intake handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};
use validator::Validate;

use vgen_models::RenderRequest;
use vgen_queue::QueueKind;

use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub detail: String,
    pub video_id: String,
}

/// POST /generate-video
///
/// Validates the request and enqueues it; the worker owns admission and
/// submission. Accepting here never blocks on a free slot.
pub async fn generate_video(
    State(state): State<AppState>,
    Json(request): Json<RenderRequest>,
) -> ApiResult<impl IntoResponse> {
    request.validate()?;

    let kind = QueueKind::for_request(&request);
    state.queue_for(&request).send(&request).await?;
    metrics::record_job_enqueued(kind.as_str());

    // Nudge idle pollers so a fresh job on an empty queue starts
    // immediately instead of waiting out the idle timer.
    if let Err(e) = state.wake.notify(&request.job_id()).await {
        warn!(job_id = %request.video_id, error = %e, "Wake publish failed");
    }

    info!(
        job_id = %request.video_id,
        scenes = request.scenes.len(),
        queue = kind.as_str(),
        "Render request accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse {
            detail: "Video generation request queued".to_string(),
            video_id: request.video_id,
        }),
    ))
}
