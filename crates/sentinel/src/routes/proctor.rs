//! Identity handshake and proctoring endpoints.

use axum::{
    Form, Json,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{StatusCode, header},
};
use serde::{Deserialize, Serialize};

use sentinel_common::{HandshakeStart, ReferenceKind, SentinelError};

use super::ApiError;
use crate::identity::HandshakeStatusView;
use crate::proctor::ProctoringSession;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct HandshakeRequest {
    candidate_id: String,
    session_id: String,
}

/// Start (or restart) an identity handshake.
///
/// Browsers post this as `FormData`, so multipart and urlencoded bodies are
/// accepted alongside JSON.
pub async fn initiate_handshake(
    State(state): State<AppState>,
    req: Request,
) -> Result<Json<HandshakeStart>, ApiError> {
    let payload = handshake_request(req, &state).await?;

    if payload.session_id.trim().is_empty() {
        return Err(SentinelError::InvalidInput("session_id is required".to_string()).into());
    }

    let start = state
        .identity
        .initiate_handshake(&payload.candidate_id, &payload.session_id)
        .await;

    Ok(Json(start))
}

/// Current state of a handshake
pub async fn handshake_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<HandshakeStatusView>, ApiError> {
    let view = state.identity.handshake_status(&session_id).await?;
    Ok(Json(view))
}

async fn handshake_request(req: Request, state: &AppState) -> Result<HandshakeRequest, ApiError> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| SentinelError::InvalidInput(rejection.body_text()))?;

        let mut candidate_id = None;
        let mut session_id = None;
        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            match field.name() {
                Some("candidate_id") => {
                    candidate_id = Some(field.text().await.map_err(bad_multipart)?);
                }
                Some("session_id") => {
                    session_id = Some(field.text().await.map_err(bad_multipart)?);
                }
                other => {
                    tracing::debug!(field = ?other, "Ignoring unexpected multipart field");
                }
            }
        }

        Ok(HandshakeRequest {
            candidate_id: candidate_id.ok_or_else(|| {
                SentinelError::InvalidInput("Missing candidate_id field".to_string())
            })?,
            session_id: session_id
                .ok_or_else(|| SentinelError::InvalidInput("Missing session_id field".to_string()))?,
        })
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(payload) = Form::<HandshakeRequest>::from_request(req, state)
            .await
            .map_err(|rejection| SentinelError::InvalidInput(rejection.body_text()))?;
        Ok(payload)
    } else {
        let Json(payload) = Json::<HandshakeRequest>::from_request(req, state)
            .await
            .map_err(|rejection| SentinelError::InvalidInput(rejection.body_text()))?;
        Ok(payload)
    }
}

#[derive(Serialize)]
pub struct UploadResponse {
    status: &'static str,
    message: String,
}

/// Upload the candidate's profile photo (multipart `session_id` + `profile_photo`)
pub async fn upload_profile(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    store_reference(&state, multipart, ReferenceKind::Profile).await
}

/// Upload the candidate's ID card (multipart `session_id` + `id_card`)
pub async fn upload_id_card(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    store_reference(&state, multipart, ReferenceKind::IdCard).await
}

async fn store_reference(
    state: &AppState,
    mut multipart: Multipart,
    kind: ReferenceKind,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut session_id = None;
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        match field.name() {
            Some("session_id") => {
                session_id = Some(field.text().await.map_err(bad_multipart)?);
            }
            Some(name) if name == file_field(kind) => {
                image = Some(field.bytes().await.map_err(bad_multipart)?.to_vec());
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unexpected multipart field");
            }
        }
    }

    let session_id = session_id
        .ok_or_else(|| SentinelError::InvalidInput("Missing session_id field".to_string()))?;
    let image = image.ok_or_else(|| {
        SentinelError::InvalidInput(format!("Missing {} field", file_field(kind)))
    })?;

    state.identity.attach_reference(&session_id, kind, image).await?;

    let message = match kind {
        ReferenceKind::Profile => "Profile photo uploaded",
        ReferenceKind::IdCard => "ID card uploaded",
    };

    Ok(Json(UploadResponse {
        status: "success",
        message: message.to_string(),
    }))
}

fn file_field(kind: ReferenceKind) -> &'static str {
    match kind {
        ReferenceKind::Profile => "profile_photo",
        ReferenceKind::IdCard => "id_card",
    }
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> ApiError {
    SentinelError::InvalidInput(format!("Malformed upload: {}", err)).into()
}

#[derive(Deserialize)]
pub struct FocusRequest {
    session_id: String,
    event_type: String,
}

/// Client-side tab visibility telemetry
pub async fn focus_event(
    State(state): State<AppState>,
    Json(payload): Json<FocusRequest>,
) -> StatusCode {
    state
        .proctor
        .log_focus_event(&payload.session_id, &payload.event_type)
        .await;
    StatusCode::NO_CONTENT
}

/// Full proctoring report for a session
pub async fn session_report(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ProctoringSession>, ApiError> {
    let report = state.proctor.session_report(&session_id).await?;
    Ok(Json(report))
}
