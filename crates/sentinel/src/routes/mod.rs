//! HTTP and WebSocket route handlers for Sentinel.

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use sentinel_common::SentinelError;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

mod health;
mod proctor;
mod ws;

/// Largest accepted reference image upload
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/metrics", get(health::metrics))

        // Identity handshake and live proctoring
        .nest("/api/proctor", proctor_routes())

        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )

        // Add shared state
        .with_state(state)
}

/// Proctoring routes (handshake, uploads, focus telemetry, live stream)
fn proctor_routes() -> Router<AppState> {
    Router::new()
        .route("/handshake", post(proctor::initiate_handshake))
        .route("/handshake/{session_id}", get(proctor::handshake_status))
        .route(
            "/verify-profile",
            post(proctor::upload_profile).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/verify-id",
            post(proctor::upload_id_card).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/focus", post(proctor::focus_event))
        .route("/sessions/{session_id}", get(proctor::session_report))
        .route("/ws/sentinel", get(ws::sentinel_socket))
}

/// `SentinelError` as an HTTP response: mapped status + `{error, retryable}` body
#[derive(Debug)]
pub struct ApiError(pub SentinelError);

impl From<SentinelError> for ApiError {
    fn from(err: SentinelError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let retryable = self.0.is_retryable();
        if status.is_server_error() {
            tracing::error!(error = %self.0, retryable, "Request failed");
        }

        (
            status,
            Json(serde_json::json!({
                "error": self.0.to_string(),
                "retryable": retryable,
            })),
        )
            .into_response()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    async fn error_body(err: SentinelError) -> (StatusCode, serde_json::Value) {
        let response = ApiError(err).into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_body_carries_retryable() {
        let (status, body) =
            error_body(SentinelError::VisionUnavailable("sidecar down".to_string())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["retryable"], true);

        let (status, body) = error_body(SentinelError::SessionNotFound("s1".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Session expired or invalid");
        assert_eq!(body["retryable"], false);
    }
}
