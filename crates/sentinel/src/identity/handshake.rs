//! Identity handshake state machine.

use chrono::Utc;
use sentinel_common::constants::messages;
use sentinel_common::{
    ChallengeAction, HandshakeResult, HandshakeStage, HandshakeStart, ReferenceKind,
    SentinelError, VerificationStatus,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::session::{HandshakeStatusView, VerificationSession};
use crate::config::HandshakeConfig;
use crate::frame::{Frame, session_file_path};
use crate::journal::{EventJournal, VerificationOutcome};
use crate::stats::ServiceStats;
use crate::store::SessionStore;
use crate::vision::{self, VisionEngine};

/// Similarities computed by one cross-verification pass
struct CrossCheck {
    id_similarity: f64,
    live_similarity: f64,
}

/// Identity handshake service
pub struct IdentityService {
    sessions: SessionStore<VerificationSession>,
    vision: Arc<dyn VisionEngine>,
    config: HandshakeConfig,
    upload_dir: PathBuf,
    journal: EventJournal,
    stats: Arc<ServiceStats>,
}

impl IdentityService {
    pub fn new(
        config: HandshakeConfig,
        upload_dir: PathBuf,
        vision: Arc<dyn VisionEngine>,
        journal: EventJournal,
        stats: Arc<ServiceStats>,
    ) -> Self {
        Self {
            sessions: SessionStore::new(),
            vision,
            config,
            upload_dir,
            journal,
            stats,
        }
    }

    /// Start (or restart) a handshake for `session_id`.
    ///
    /// An existing session with the same id is reset to a fresh pending
    /// session and its stored images are deleted; uploads and captures must
    /// be repeated.
    pub async fn initiate_handshake(&self, candidate_id: &str, session_id: &str) -> HandshakeStart {
        let session = VerificationSession::new(candidate_id, session_id);
        let first_challenge = ChallengeAction::SEQUENCE[0];

        let (guard, previous) = self.sessions.replace(session_id, session).await;
        if let Some(previous) = previous {
            tracing::warn!(
                session_id = %session_id,
                candidate_id = %candidate_id,
                previous_candidate = %previous.candidate_id,
                "Handshake re-initiated, previous session reset"
            );
            // The new session reuses the same file names; keep it locked
            // until the old files are gone.
            remove_files(previous.stored_files()).await;
        } else {
            tracing::info!(
                session_id = %session_id,
                candidate_id = %candidate_id,
                "Handshake initiated"
            );
        }
        drop(guard);
        ServiceStats::incr(&self.stats.handshakes_started);

        HandshakeStart {
            session_id: session_id.to_string(),
            first_challenge,
            message: messages::HANDSHAKE_STARTED.to_string(),
        }
    }

    /// Store an uploaded profile photo or ID card for a pending handshake
    pub async fn attach_reference(
        &self,
        session_id: &str,
        kind: ReferenceKind,
        bytes: Vec<u8>,
    ) -> Result<PathBuf, SentinelError> {
        let mut session = self
            .sessions
            .lock(session_id)
            .await
            .ok_or_else(|| SentinelError::SessionNotFound(session_id.to_string()))?;

        if session.status.is_terminal() {
            return Err(SentinelError::InvalidInput(
                "Handshake already completed".to_string(),
            ));
        }

        let bytes = tokio::task::spawn_blocking(move || {
            Frame::decode_bytes(&bytes)
                .map(|_| bytes)
                .map_err(|e| SentinelError::InvalidInput(format!("Not a readable image: {}", e)))
        })
        .await
        .map_err(|e| SentinelError::Internal(e.to_string()))??;

        let path = session_file_path(&self.upload_dir, session_id, kind.file_suffix());
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::write(&path, &bytes).await?;

        session.set_reference(kind, path.clone());

        tracing::info!(
            session_id = %session_id,
            kind = ?kind,
            bytes = bytes.len(),
            "Reference image stored"
        );

        Ok(path)
    }

    /// Evaluate one handshake frame.
    ///
    /// Never fails: every problem is reported inside the result with
    /// `verified: false`.
    pub async fn verify_handshake(&self, session_id: &str, frame: Frame) -> HandshakeResult {
        let Some(mut session) = self.sessions.lock(session_id).await else {
            tracing::debug!(session_id = %session_id, "Handshake frame for unknown session");
            return HandshakeResult::error(messages::SESSION_INVALID);
        };
        ServiceStats::incr(&self.stats.handshake_frames);

        match &session.status {
            VerificationStatus::Verified { confidence } => {
                return HandshakeResult::verified(*confidence);
            }
            VerificationStatus::Failed { reason } => {
                return HandshakeResult::failed(reason.clone());
            }
            VerificationStatus::Pending => {}
        }

        if let Some(target) = session.current_challenge() {
            let vision = self.vision.clone();
            let joined = tokio::task::spawn_blocking(move || {
                let pose = vision.head_pose(&frame);
                (vision::satisfies(target, &pose), frame)
            })
            .await;

            let (valid, frame) = match joined {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(session_id = %session_id, error = %e, "Pose task failed");
                    return HandshakeResult::error(SentinelError::Internal(e.to_string()).to_string());
                }
            };

            if !valid {
                tracing::trace!(session_id = %session_id, challenge = %target, "Pose not matched");
                return HandshakeResult::waiting(target);
            }

            let path = session_file_path(&self.upload_dir, session_id, target.as_str());
            if let Err(e) = persist_frame(frame, path.clone(), self.upload_dir.clone()).await {
                tracing::error!(session_id = %session_id, error = %e, "Failed to store challenge frame");
                return HandshakeResult::error(e.to_string());
            }

            let next = session.capture(target, path);
            tracing::info!(
                session_id = %session_id,
                challenge = %target,
                next = ?next,
                "Liveness challenge captured"
            );

            if let Some(next) = next {
                return HandshakeResult::progressing(next);
            }
        }

        self.cross_verify(&mut session).await
    }

    /// Final cross-verification against profile photo and ID card
    async fn cross_verify(&self, session: &mut VerificationSession) -> HandshakeResult {
        let check = match self.compute_similarities(session).await {
            Ok(check) => check,
            Err(SentinelError::MissingReferenceFrame(session_id)) => {
                tracing::error!(
                    session_id = %session_id,
                    "Cross-verification reached without a centered capture"
                );
                return HandshakeResult::error(messages::CENTER_FRAME_MISSING);
            }
            Err(e) => return HandshakeResult::error(e.to_string()),
        };

        let id_verified = check.id_similarity >= self.config.id_match_threshold;
        let live_verified = check.live_similarity >= self.config.live_match_threshold;
        let confidence = (check.id_similarity + check.live_similarity) / 2.0;
        let verified = id_verified && live_verified;

        if !verified {
            session.failed_attempts += 1;
        }

        self.journal
            .record_outcome(
                &session.session_id,
                &VerificationOutcome {
                    timestamp: Utc::now(),
                    candidate_id: session.candidate_id.clone(),
                    verified,
                    id_similarity: check.id_similarity,
                    live_similarity: check.live_similarity,
                    attempt: session.failed_attempts + u32::from(verified),
                },
            )
            .await;

        if verified {
            session.status = VerificationStatus::Verified { confidence };
            ServiceStats::incr(&self.stats.identities_verified);
            tracing::info!(
                session_id = %session.session_id,
                candidate_id = %session.candidate_id,
                confidence = confidence,
                "Identity verified"
            );
            return HandshakeResult::verified(confidence);
        }

        let reason = if !id_verified {
            messages::ID_MISMATCH
        } else {
            messages::LIVE_MISMATCH
        };

        let mut result = HandshakeResult::rejected(confidence, reason);

        if session.failed_attempts >= self.config.max_verification_attempts {
            session.status = VerificationStatus::Failed {
                reason: reason.to_string(),
            };
            result.status = Some(HandshakeStage::Failed);
            ServiceStats::incr(&self.stats.identities_failed);
            tracing::warn!(
                session_id = %session.session_id,
                candidate_id = %session.candidate_id,
                attempts = session.failed_attempts,
                reason = reason,
                "Identity verification failed"
            );
        } else {
            tracing::info!(
                session_id = %session.session_id,
                id_similarity = check.id_similarity,
                live_similarity = check.live_similarity,
                attempts = session.failed_attempts,
                "Identity verification rejected"
            );
        }

        result
    }

    async fn compute_similarities(
        &self,
        session: &VerificationSession,
    ) -> Result<CrossCheck, SentinelError> {
        let (Some(profile), Some(id_card)) = (
            session.profile_photo_path.clone(),
            session.id_card_path.clone(),
        ) else {
            return Err(SentinelError::VerificationIncomplete);
        };

        let center = session
            .captured(ChallengeAction::LookCenter)
            .map(Path::to_path_buf)
            .ok_or_else(|| SentinelError::MissingReferenceFrame(session.session_id.clone()))?;

        let vision = self.vision.clone();
        tokio::task::spawn_blocking(move || CrossCheck {
            id_similarity: vision.compare_faces(&id_card, &profile).similarity,
            live_similarity: vision.compare_faces(&profile, &center).similarity,
        })
        .await
        .map_err(|e| SentinelError::Internal(e.to_string()))
    }

    /// Read-only snapshot of a handshake
    pub async fn handshake_status(&self, session_id: &str) -> Result<HandshakeStatusView, SentinelError> {
        self.sessions
            .read(session_id, VerificationSession::status_view)
            .await
            .ok_or_else(|| SentinelError::SessionNotFound(session_id.to_string()))
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.len().await
    }

    /// Evict idle handshakes and delete their stored images
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut files = Vec::new();
        let evicted = self
            .sessions
            .evict_idle(ttl, |session_id, session| {
                tracing::debug!(session_id = %session_id, "Evicting idle handshake");
                files.extend(session.stored_files());
            })
            .await;

        remove_files(files).await;
        evicted
    }
}

async fn remove_files(paths: Vec<PathBuf>) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = ?path, error = %e, "Failed to remove stored image");
            }
        }
    }
}

async fn persist_frame(frame: Frame, path: PathBuf, dir: PathBuf) -> Result<(), SentinelError> {
    tokio::task::spawn_blocking(move || {
        std::fs::create_dir_all(&dir)?;
        frame.save_jpeg(&path)
    })
    .await
    .map_err(|e| SentinelError::Internal(e.to_string()))?
}
