//! Health check handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub redis: CheckStatus,
    pub storage: CheckStatus,
    pub standard_queue: QueueCheck,
    pub captioned_queue: QueueCheck,
}

/// Queue reachability plus backlog sizes.
#[derive(Serialize)]
pub struct QueueCheck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backlog: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_lettered: Option<u64>,
}

impl QueueCheck {
    async fn probe(queue: &dyn vgen_queue::QueueSource) -> Self {
        match queue.depth().await {
            Ok(depth) => Self {
                status: "ok".to_string(),
                error: None,
                backlog: Some(depth.ready),
                dead_lettered: Some(depth.dead),
            },
            Err(e) => Self {
                status: "error".to_string(),
                error: Some(e.to_string()),
                backlog: None,
                dead_lettered: None,
            },
        }
    }
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    fn ok(latency_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
            latency_ms: Some(latency_ms),
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
            latency_ms: None,
        }
    }

    fn skipped() -> Self {
        Self {
            status: "skipped".to_string(),
            error: None,
            latency_ms: None,
        }
    }
}

/// Readiness check endpoint (readiness probe).
/// Checks connectivity to the slot ledger and the artifact bucket.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    use std::time::Instant;

    // Slot ledger (Redis)
    let redis_check = {
        let start = Instant::now();
        match state.store.count().await {
            Ok(_) => CheckStatus::ok(start.elapsed().as_millis() as u64),
            Err(e) => CheckStatus::error(e.to_string()),
        }
    };

    // Artifact bucket (via bucket head)
    let storage_check = match &state.storage {
        Some(storage) => {
            let start = Instant::now();
            match storage.check_connectivity().await {
                Ok(_) => CheckStatus::ok(start.elapsed().as_millis() as u64),
                Err(e) => CheckStatus::error(e.to_string()),
            }
        }
        None => CheckStatus::skipped(),
    };

    // Queue backlogs (stream lengths)
    let standard_check = QueueCheck::probe(state.standard_queue.as_ref()).await;
    let captioned_check = QueueCheck::probe(state.captioned_queue.as_ref()).await;

    let all_ok = redis_check.status == "ok"
        && storage_check.status != "error"
        && standard_check.status == "ok"
        && captioned_check.status == "ok";

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks: ReadinessChecks {
            redis: redis_check,
            storage: storage_check,
            standard_queue: standard_check,
            captioned_queue: captioned_check,
        },
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ApiConfig;
    use crate::routes::create_router;
    use crate::state::AppState;
    use crate::testutil::{RecordingQueue, RecordingWake};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;
    use vgen_models::{RenderRequest, Scene};
    use vgen_queue::QueueSource;
    use vgen_store::MemorySlotStore;

    #[tokio::test]
    async fn ready_reports_queue_backlogs() {
        let standard = Arc::new(RecordingQueue::new());
        let captioned = Arc::new(RecordingQueue::new());
        let request = RenderRequest::new(
            "vid-1",
            vec![Scene::new("https://e.com/v.mp4", "https://e.com/a.mp3")],
        );
        standard.send(&request).await.unwrap();

        let state = AppState::with_parts(
            ApiConfig::default(),
            Arc::new(MemorySlotStore::new()),
            standard,
            captioned,
            Arc::new(RecordingWake::new()),
            None,
            None,
        );
        let router = create_router(state, None);

        let response = router
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["checks"]["standard_queue"]["backlog"], 1);
        assert_eq!(json["checks"]["captioned_queue"]["backlog"], 0);
        assert_eq!(json["checks"]["standard_queue"]["dead_lettered"], 0);
    }
}
