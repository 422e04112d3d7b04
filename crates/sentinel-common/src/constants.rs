//! Shared constants for Sentinel components.

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8890";

/// Default directory for uploaded references and captured frames
pub const DEFAULT_UPLOAD_DIR: &str = "/tmp/sentinel_uploads";

/// `look_center` accepts yaw within this many degrees of zero (inclusive)
pub const CENTER_YAW_LIMIT_DEG: f64 = 15.0;

/// `turn_left` / `turn_right` require yaw strictly beyond this many degrees
pub const TURN_YAW_MIN_DEG: f64 = 20.0;

/// Minimum ID-card vs profile-photo similarity
pub const DEFAULT_ID_MATCH_THRESHOLD: f64 = 0.60;

/// Minimum profile-photo vs live-capture similarity
pub const DEFAULT_LIVE_MATCH_THRESHOLD: f64 = 0.75;

/// Failed cross-verifications before a handshake is marked failed
pub const DEFAULT_MAX_VERIFICATION_ATTEMPTS: u32 = 3;

/// Continuous gaze-away time that raises a yellow flag (seconds)
pub const DEFAULT_GAZE_OFF_THRESHOLD_SECS: f64 = 3.0;

/// Yaw or pitch beyond this many degrees counts as looking away
pub const DEFAULT_GAZE_ANGLE_LIMIT_DEG: f64 = 25.0;

/// Object labels that raise a red flag on detection
pub const DEFAULT_CONTRABAND_LABELS: &[&str] = &["cell phone", "book"];

/// Detection label for people in frame
pub const PERSON_LABEL: &str = "person";

/// Idle session time-to-live (2 hours)
pub const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 7200;

/// How often idle sessions are swept (seconds)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Vision sidecar request timeout (milliseconds)
pub const DEFAULT_VISION_TIMEOUT_MS: u64 = 2000;

/// Redis key prefixes
pub mod redis_keys {
    /// Proctoring log entries: sentinel:proctor:log:{session_id}
    pub const PROCTOR_LOG_PREFIX: &str = "sentinel:proctor:log:";

    /// Cross-verification outcomes: sentinel:identity:outcome:{session_id}
    pub const IDENTITY_OUTCOME_PREFIX: &str = "sentinel:identity:outcome:";
}

/// User-facing messages that clients match on
pub mod messages {
    pub const SESSION_INVALID: &str = "Session expired or invalid";
    pub const AWAITING_UPLOADS: &str = "Waiting for ID and Profile photo uploads.";
    pub const ID_MISMATCH: &str = "Face on ID does not match profile photo.";
    pub const LIVE_MISMATCH: &str = "Live biometrics do not match profile photo.";
    pub const CENTER_FRAME_MISSING: &str = "Live center frame missing";
    pub const IDENTITY_VERIFIED: &str = "Identity verified against ID card and live capture.";
    pub const HANDSHAKE_STARTED: &str = "Initiate 3-axis biometric scan.";
}
