//! Common error types for Sentinel components.

use thiserror::Error;

use crate::constants::messages;

/// Common errors across Sentinel components
#[derive(Debug, Error)]
pub enum SentinelError {
    /// Referenced session id is not in the relevant table
    #[error("{}", messages::SESSION_INVALID)]
    SessionNotFound(String),

    /// Image payload could not be decoded
    #[error("Frame decode failed: {0}")]
    FrameDecode(String),

    /// Vision capability is not loaded or not reachable
    #[error("Vision primitive unavailable: {0}")]
    VisionUnavailable(String),

    /// Cross-verification prerequisites (uploads) are missing
    #[error("{}", messages::AWAITING_UPLOADS)]
    VerificationIncomplete,

    /// Cross-verification reached without a captured `look_center` frame
    #[error("{}", messages::CENTER_FRAME_MISSING)]
    MissingReferenceFrame(String),

    /// Invalid input/request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Filesystem error while persisting or removing images
    #[error("Storage error: {0}")]
    Storage(String),

    /// Redis connection/operation error
    #[error("Redis error: {0}")]
    Redis(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SentinelError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::SessionNotFound(_) => 404,
            Self::FrameDecode(_) => 400,
            Self::VisionUnavailable(_) => 503,
            Self::VerificationIncomplete => 409,
            Self::MissingReferenceFrame(_) => 500,
            Self::InvalidInput(_) => 400,
            Self::Storage(_) => 500,
            Self::Redis(_) => 503,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::VerificationIncomplete | Self::VisionUnavailable(_) | Self::Redis(_)
        )
    }
}

impl From<std::io::Error> for SentinelError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
