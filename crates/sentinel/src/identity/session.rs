//! Verification session record.

use chrono::{DateTime, Utc};
use sentinel_common::{ChallengeAction, ReferenceKind, VerificationStatus};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One identity handshake in progress
#[derive(Debug, Clone)]
pub struct VerificationSession {
    pub session_id: String,
    pub candidate_id: String,
    pub status: VerificationStatus,
    pub profile_photo_path: Option<PathBuf>,
    pub id_card_path: Option<PathBuf>,
    pub challenges: Vec<ChallengeAction>,
    /// Cursor into `challenges`; never decreases, never exceeds `challenges.len()`
    pub current_challenge_index: usize,
    /// Captured reference frame per challenge, in challenge order
    pub captured_angles: Vec<(ChallengeAction, PathBuf)>,
    /// Cross-verifications that computed similarities and were rejected
    pub failed_attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl VerificationSession {
    pub fn new(candidate_id: &str, session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            candidate_id: candidate_id.to_string(),
            status: VerificationStatus::Pending,
            profile_photo_path: None,
            id_card_path: None,
            challenges: ChallengeAction::SEQUENCE.to_vec(),
            current_challenge_index: 0,
            captured_angles: Vec::new(),
            failed_attempts: 0,
            created_at: Utc::now(),
        }
    }

    /// Challenge awaiting a matching pose, `None` once all are captured
    pub fn current_challenge(&self) -> Option<ChallengeAction> {
        self.challenges.get(self.current_challenge_index).copied()
    }

    /// Record the frame for the current challenge and advance the cursor.
    /// Returns the next challenge, or `None` if this was the last one.
    pub fn capture(&mut self, action: ChallengeAction, path: PathBuf) -> Option<ChallengeAction> {
        debug_assert_eq!(self.current_challenge(), Some(action));
        if self.captured(action).is_none() {
            self.captured_angles.push((action, path));
        }
        self.current_challenge_index = (self.current_challenge_index + 1).min(self.challenges.len());
        self.current_challenge()
    }

    pub fn captured(&self, action: ChallengeAction) -> Option<&Path> {
        self.captured_angles
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, p)| p.as_path())
    }

    pub fn set_reference(&mut self, kind: ReferenceKind, path: PathBuf) {
        match kind {
            ReferenceKind::Profile => self.profile_photo_path = Some(path),
            ReferenceKind::IdCard => self.id_card_path = Some(path),
        }
    }

    /// Every file this session owns on disk
    pub fn stored_files(&self) -> Vec<PathBuf> {
        self.captured_angles
            .iter()
            .map(|(_, p)| p.clone())
            .chain(self.profile_photo_path.clone())
            .chain(self.id_card_path.clone())
            .collect()
    }

    pub fn status_view(&self) -> HandshakeStatusView {
        HandshakeStatusView {
            session_id: self.session_id.clone(),
            candidate_id: self.candidate_id.clone(),
            status: self.status.clone(),
            current_challenge: self.current_challenge(),
            captured: self.captured_angles.iter().map(|(a, _)| *a).collect(),
            profile_uploaded: self.profile_photo_path.is_some(),
            id_uploaded: self.id_card_path.is_some(),
            failed_attempts: self.failed_attempts,
            created_at: self.created_at,
        }
    }
}

/// Read-only handshake snapshot for status polling
#[derive(Debug, Clone, Serialize)]
pub struct HandshakeStatusView {
    pub session_id: String,
    pub candidate_id: String,
    pub status: VerificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_challenge: Option<ChallengeAction>,
    pub captured: Vec<ChallengeAction>,
    pub profile_uploaded: bool,
    pub id_uploaded: bool,
    pub failed_attempts: u32,
    pub created_at: DateTime<Utc>,
}
