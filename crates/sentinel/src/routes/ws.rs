//! Live frame stream over WebSocket.
//!
//! One connection carries both handshake and proctoring frames. Messages are
//! processed strictly in arrival order: the next message is not read until the
//! reply to the previous one has been sent.

use axum::{
    extract::State,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use sentinel_common::{HandshakeResult, ProctorUpdate};

use crate::frame::Frame;
use crate::state::AppState;
use crate::stats::ServiceStats;

/// Message sent by the browser client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    HandshakeFrame {
        session_id: String,
        frame: Option<String>,
    },
    ProctorFrame {
        session_id: String,
        frame: Option<String>,
    },
    FocusEvent {
        session_id: String,
        event_type: String,
    },
}

/// Reply pushed back to the client
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    HandshakeResult(HandshakeResult),
    ProctorUpdate(ProctorUpdate),
}

/// Upgrade to the sentinel WebSocket
pub async fn sentinel_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let connection_id = format!("{:08x}", rand::random::<u32>());
        let span = tracing::info_span!("ws", connection = %connection_id);
        handle_socket(socket, state).instrument(span)
    })
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    tracing::debug!("WebSocket client connected");

    while let Some(msg_result) = receiver.next().await {
        let msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket receive error");
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                let Some(reply) = handle_text(&state, text.as_str()).await else {
                    continue;
                };

                let payload = match serde_json::to_string(&reply) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to encode reply");
                        continue;
                    }
                };

                if sender.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
            Message::Ping(data) => {
                if sender.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    tracing::debug!("WebSocket client disconnected");
}

/// Process one text message. `None` means the message is dropped without a
/// reply: bad JSON, a missing or undecodable frame, or a focus event.
pub async fn handle_text(state: &AppState, text: &str) -> Option<ServerMessage> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(error = %e, "Dropping unparseable message");
            return None;
        }
    };

    match message {
        ClientMessage::HandshakeFrame { session_id, frame } => {
            let frame = decode_frame(state, &session_id, frame).await?;
            let result = state.identity.verify_handshake(&session_id, frame).await;
            Some(ServerMessage::HandshakeResult(result))
        }
        ClientMessage::ProctorFrame { session_id, frame } => {
            let frame = decode_frame(state, &session_id, frame).await?;
            let update = state.proctor.process_frame(&session_id, frame).await;
            Some(ServerMessage::ProctorUpdate(update))
        }
        ClientMessage::FocusEvent {
            session_id,
            event_type,
        } => {
            state.proctor.log_focus_event(&session_id, &event_type).await;
            None
        }
    }
}

async fn decode_frame(state: &AppState, session_id: &str, data: Option<String>) -> Option<Frame> {
    let Some(data) = data else {
        tracing::debug!(session_id = %session_id, "Dropping message without frame");
        return None;
    };

    let decoded = tokio::task::spawn_blocking(move || Frame::decode_data_url(&data)).await;

    match decoded {
        Ok(Ok(frame)) => {
            tracing::trace!(
                session_id = %session_id,
                width = frame.width(),
                height = frame.height(),
                "Frame decoded"
            );
            Some(frame)
        }
        Ok(Err(e)) => {
            ServiceStats::incr(&state.stats.frames_dropped);
            tracing::warn!(session_id = %session_id, error = %e, "Dropping undecodable frame");
            None
        }
        Err(e) => {
            ServiceStats::incr(&state.stats.frames_dropped);
            tracing::error!(session_id = %session_id, error = %e, "Frame decode task failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::test_support::png_data_url;
    use crate::routes::test_support::state_with;
    use crate::vision::UnavailableVision;
    use crate::vision::testing::ScriptedVision;
    use sentinel_common::{ChallengeAction, ProctorStatus};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unparseable_message_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(Arc::new(UnavailableVision), &dir);

        assert!(handle_text(&state, "not json").await.is_none());
        assert!(handle_text(&state, r#"{"type":"unknown","session_id":"s1"}"#).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_frame_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(Arc::new(UnavailableVision), &dir);

        let reply = handle_text(&state, r#"{"type":"proctor_frame","session_id":"p1"}"#).await;
        assert!(reply.is_none());
        assert_eq!(state.proctor.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_undecodable_frame_counted() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(Arc::new(UnavailableVision), &dir);

        let msg = r#"{"type":"proctor_frame","session_id":"p1","frame":"data:image/jpeg;base64,!!!"}"#;
        assert!(handle_text(&state, msg).await.is_none());
        assert_eq!(state.stats.snapshot().frames_dropped, 1);
    }

    #[tokio::test]
    async fn test_handshake_frame_reply() {
        let dir = tempfile::tempdir().unwrap();
        let vision = Arc::new(ScriptedVision::new());
        vision.push_pose(0.0, 0.0);
        let state = state_with(vision, &dir);
        state.identity.initiate_handshake("cand1", "s1").await;

        let msg = serde_json::json!({
            "type": "handshake_frame",
            "session_id": "s1",
            "frame": png_data_url(16, 16),
        })
        .to_string();

        match handle_text(&state, &msg).await {
            Some(ServerMessage::HandshakeResult(result)) => {
                assert!(!result.verified);
                assert_eq!(result.next_challenge, Some(ChallengeAction::TurnLeft));
            }
            other => panic!("unexpected reply: {:?}", other),
        }
        assert_eq!(state.stats.snapshot().handshake_frames, 1);
    }

    #[tokio::test]
    async fn test_proctor_frame_reply_shape() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(Arc::new(ScriptedVision::new()), &dir);

        let msg = serde_json::json!({
            "type": "proctor_frame",
            "session_id": "p1",
            "frame": png_data_url(16, 16),
        })
        .to_string();

        let reply = handle_text(&state, &msg).await.unwrap();
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "proctor_update");
        assert_eq!(json["data"]["status"], "clean");

        match reply {
            ServerMessage::ProctorUpdate(update) => assert_eq!(update.status, ProctorStatus::Clean),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_focus_event_has_no_reply() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(Arc::new(ScriptedVision::new()), &dir);
        state.proctor.process_frame("p1", crate::frame::test_support::blank_frame()).await;

        let msg = r#"{"type":"focus_event","session_id":"p1","event_type":"blur"}"#;
        assert!(handle_text(&state, msg).await.is_none());

        let report = state.proctor.session_report("p1").await.unwrap();
        assert_eq!(report.yellow_flags, 1);
    }
}
