//! Health check endpoints.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::AppState;
use crate::stats::StatsSnapshot;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check (is the server running?)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    /// `None` when no Redis journal is configured
    redis: Option<bool>,
    vision: &'static str,
}

/// Readiness check (are all dependencies healthy?)
///
/// A missing vision backend does not fail readiness; the service degrades
/// to negative results instead.
pub async fn ready_check(
    State(state): State<AppState>,
) -> Result<Json<ReadyResponse>, StatusCode> {
    let redis = state.journal.ping().await;

    if redis == Some(false) {
        // Return 503 if not ready
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(ReadyResponse {
        status: "ready",
        redis,
        vision: state.vision.name(),
    }))
}

#[derive(Serialize)]
pub struct MetricsResponse {
    uptime_secs: u64,
    vision_backend: &'static str,
    active_handshakes: usize,
    active_proctoring: usize,
    #[serde(flatten)]
    counters: StatsSnapshot,
}

/// Metrics endpoint (for monitoring)
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        uptime_secs: state.started_at.elapsed().as_secs(),
        vision_backend: state.vision.name(),
        active_handshakes: state.identity.active_sessions().await,
        active_proctoring: state.proctor.active_sessions().await,
        counters: state.stats.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{create_router, test_support::state_with};
    use crate::vision::UnavailableVision;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn get_json(state: AppState, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = create_router(state)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_ready_without_redis() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(Arc::new(UnavailableVision), &dir);
        let (status, body) = get_json(state, "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["redis"], serde_json::Value::Null);
        assert_eq!(body["vision"], "unavailable");
    }

    #[tokio::test]
    async fn test_metrics_counts_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(Arc::new(UnavailableVision), &dir);
        state.identity.initiate_handshake("cand1", "s1").await;

        let (status, body) = get_json(state, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active_handshakes"], 1);
        assert_eq!(body["active_proctoring"], 0);
        assert_eq!(body["handshakes_started"], 1);
    }
}
