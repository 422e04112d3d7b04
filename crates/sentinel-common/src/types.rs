//! Core types shared across Sentinel components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::messages;

/// A directed head-pose action the candidate performs during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeAction {
    LookCenter,
    TurnLeft,
    TurnRight,
}

impl ChallengeAction {
    /// Challenge order for every handshake. Must start with `LookCenter`:
    /// the centered capture is the live reference for cross-verification.
    pub const SEQUENCE: [ChallengeAction; 3] = [
        ChallengeAction::LookCenter,
        ChallengeAction::TurnLeft,
        ChallengeAction::TurnRight,
    ];

    /// Wire label (`look_center`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LookCenter => "look_center",
            Self::TurnLeft => "turn_left",
            Self::TurnRight => "turn_right",
        }
    }

    /// Human-readable alignment instruction
    pub fn instruction(&self) -> String {
        format!("Align head to {}", self.as_str().replace('_', " "))
    }
}

impl fmt::Display for ChallengeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Head rotation estimated from a single frame, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    pub yaw: f64,
    pub pitch: f64,
    pub detected: bool,
}

impl HeadPose {
    pub fn new(yaw: f64, pitch: f64) -> Self {
        Self {
            yaw,
            pitch,
            detected: true,
        }
    }

    /// No face found (or no pose model loaded)
    pub fn undetected() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            detected: false,
        }
    }
}

/// Gaze classification for one proctoring frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gaze {
    Center,
    Off,
}

/// An object found in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Result of comparing two face images
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    /// Normalized resemblance in [0, 1]
    pub similarity: f64,
    /// Similarity cleared the backend's own fixed threshold
    pub verified: bool,
}

impl FaceMatch {
    /// Negative result used whenever comparison is impossible
    pub fn none() -> Self {
        Self {
            similarity: 0.0,
            verified: false,
        }
    }
}

/// Which reference image an upload carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Profile,
    IdCard,
}

impl ReferenceKind {
    /// Suffix used in stored file names
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::IdCard => "id",
        }
    }
}

/// Identity handshake lifecycle
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Challenges or cross-verification outstanding
    #[default]
    Pending,
    /// Terminal success
    Verified { confidence: f64 },
    /// Terminal failure after exhausting verification attempts
    Failed { reason: String },
}

impl VerificationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Response to `initiate_handshake`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeStart {
    pub session_id: String,
    pub first_challenge: ChallengeAction,
    pub message: String,
}

/// Transient stage reported alongside a non-verified handshake result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandshakeStage {
    Waiting,
    Progressing,
    Failed,
}

/// Handshake verification result sent to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeResult {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<HandshakeStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_challenge: Option<ChallengeAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_challenge: Option<ChallengeAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HandshakeResult {
    fn blank(verified: bool) -> Self {
        Self {
            verified,
            status: None,
            error: None,
            current_challenge: None,
            next_challenge: None,
            confidence: None,
            message: None,
        }
    }

    /// Pose did not satisfy the current challenge
    pub fn waiting(target: ChallengeAction) -> Self {
        Self {
            status: Some(HandshakeStage::Waiting),
            error: Some(target.instruction()),
            current_challenge: Some(target),
            ..Self::blank(false)
        }
    }

    /// Challenge captured, more remain
    pub fn progressing(next: ChallengeAction) -> Self {
        Self {
            status: Some(HandshakeStage::Progressing),
            next_challenge: Some(next),
            ..Self::blank(false)
        }
    }

    /// Cross-verification passed
    pub fn verified(confidence: f64) -> Self {
        Self {
            confidence: Some(confidence),
            message: Some(messages::IDENTITY_VERIFIED.to_string()),
            ..Self::blank(true)
        }
    }

    /// Cross-verification computed similarities and rejected them
    pub fn rejected(confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            confidence: Some(confidence),
            error: Some(reason.into()),
            ..Self::blank(false)
        }
    }

    /// Handshake is terminally failed
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: Some(HandshakeStage::Failed),
            error: Some(reason.into()),
            ..Self::blank(false)
        }
    }

    /// Non-fatal error surfaced as a structured field
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::blank(false)
        }
    }
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Soft behavioral warning (gaze-away)
    YellowFlag,
    /// Hard violation (forbidden object)
    RedFlag,
    /// Client-reported focus loss
    Warning,
}

/// An alert raised while processing a frame or client event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub reason: String,
}

impl Alert {
    pub fn new(kind: AlertKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// Timestamped entry in a proctoring session's log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub reason: String,
}

impl LogEntry {
    pub fn from_alert(timestamp: DateTime<Utc>, alert: &Alert) -> Self {
        Self {
            timestamp,
            kind: alert.kind,
            reason: alert.reason.clone(),
        }
    }
}

/// Cumulative flag counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub yellow_flags: u32,
    pub red_flags: u32,
}

/// Per-frame proctoring status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProctorStatus {
    Clean,
    Warning,
}

/// Response to `process_frame`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProctorUpdate {
    pub status: ProctorStatus,
    pub alerts: Vec<Alert>,
    pub session_summary: SessionSummary,
}
