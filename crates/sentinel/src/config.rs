//! Configuration management for Sentinel.

use anyhow::{Context, Result};
use sentinel_common::SentinelError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use sentinel_common::constants::{
    DEFAULT_CONTRABAND_LABELS, DEFAULT_GAZE_ANGLE_LIMIT_DEG, DEFAULT_GAZE_OFF_THRESHOLD_SECS,
    DEFAULT_ID_MATCH_THRESHOLD, DEFAULT_LISTEN_ADDR, DEFAULT_LIVE_MATCH_THRESHOLD,
    DEFAULT_MAX_VERIFICATION_ATTEMPTS, DEFAULT_SESSION_IDLE_TTL_SECS, DEFAULT_SWEEP_INTERVAL_SECS,
    DEFAULT_UPLOAD_DIR, DEFAULT_VISION_TIMEOUT_MS,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Redis URL for the event journal (journal disabled when unset)
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Directory for uploaded references and captured frames
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Identity handshake configuration
    #[serde(default)]
    pub handshake: HandshakeConfig,

    /// Live proctoring configuration
    #[serde(default)]
    pub proctor: ProctorConfig,

    /// Vision backend configuration
    #[serde(default)]
    pub vision: VisionConfig,

    /// Session retention configuration
    #[serde(default)]
    pub sessions: SessionConfig,
}

/// Identity handshake thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct HandshakeConfig {
    /// Minimum ID card vs profile photo similarity
    #[serde(default = "default_id_match")]
    pub id_match_threshold: f64,

    /// Minimum profile photo vs live center capture similarity
    #[serde(default = "default_live_match")]
    pub live_match_threshold: f64,

    /// Rejected cross-verifications before the handshake fails
    #[serde(default = "default_max_attempts")]
    pub max_verification_attempts: u32,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            id_match_threshold: default_id_match(),
            live_match_threshold: default_live_match(),
            max_verification_attempts: default_max_attempts(),
        }
    }
}

/// Proctoring loop thresholds and rules
#[derive(Debug, Clone, Deserialize)]
pub struct ProctorConfig {
    /// Continuous gaze-away seconds that raise a yellow flag
    #[serde(default = "default_gaze_threshold")]
    pub gaze_off_threshold_secs: f64,

    /// Yaw/pitch limit for a centered gaze (degrees)
    #[serde(default = "default_gaze_angle")]
    pub gaze_angle_limit_deg: f64,

    /// Labels that raise a red flag when detected
    #[serde(default = "default_contraband_labels")]
    pub contraband_labels: Vec<String>,

    /// Persons allowed in frame; the multi-person rule is off when unset
    #[serde(default)]
    pub max_persons: Option<u32>,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            gaze_off_threshold_secs: default_gaze_threshold(),
            gaze_angle_limit_deg: default_gaze_angle(),
            contraband_labels: default_contraband_labels(),
            max_persons: None,
        }
    }
}

/// Which vision backend to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisionBackend {
    /// No models; every call returns the safe default
    #[default]
    None,
    /// HTTP inference sidecar
    Remote,
}

/// Vision backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct VisionConfig {
    #[serde(default)]
    pub backend: VisionBackend,

    /// Sidecar base URL
    #[serde(default = "default_vision_endpoint")]
    pub endpoint: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_vision_timeout")]
    pub timeout_ms: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            backend: VisionBackend::default(),
            endpoint: default_vision_endpoint(),
            timeout_ms: default_vision_timeout(),
        }
    }
}

/// Session retention
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session is evicted
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: u64,

    /// Sweep interval for idle eviction
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_upload_dir() -> PathBuf { PathBuf::from(DEFAULT_UPLOAD_DIR) }
fn default_id_match() -> f64 { DEFAULT_ID_MATCH_THRESHOLD }
fn default_live_match() -> f64 { DEFAULT_LIVE_MATCH_THRESHOLD }
fn default_max_attempts() -> u32 { DEFAULT_MAX_VERIFICATION_ATTEMPTS }
fn default_gaze_threshold() -> f64 { DEFAULT_GAZE_OFF_THRESHOLD_SECS }
fn default_gaze_angle() -> f64 { DEFAULT_GAZE_ANGLE_LIMIT_DEG }
fn default_contraband_labels() -> Vec<String> {
    DEFAULT_CONTRABAND_LABELS.iter().map(|s| s.to_string()).collect()
}
fn default_vision_endpoint() -> String { "http://127.0.0.1:8500".to_string() }
fn default_vision_timeout() -> u64 { DEFAULT_VISION_TIMEOUT_MS }
fn default_idle_ttl() -> u64 { DEFAULT_SESSION_IDLE_TTL_SECS }
fn default_sweep_interval() -> u64 { DEFAULT_SWEEP_INTERVAL_SECS }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = Self::from_file(config_path)?;

        // Apply CLI overrides
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(ref redis_url) = args.redis_url {
            config.redis_url = Some(redis_url.clone());
        }
        if let Some(ref upload_dir) = args.upload_dir {
            config.upload_dir = upload_dir.clone();
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(config_path: &str) -> Result<Self> {
        if !Path::new(config_path).exists() {
            // Use defaults if config file doesn't exist
            tracing::warn!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path))
            .build()
            .context("Failed to load config file")?;

        settings
            .try_deserialize()
            .context("Failed to parse config")
    }

    fn validate(&self) -> Result<(), SentinelError> {
        let h = &self.handshake;
        for (name, value) in [
            ("handshake.id_match_threshold", h.id_match_threshold),
            ("handshake.live_match_threshold", h.live_match_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SentinelError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if h.max_verification_attempts == 0 {
            return Err(SentinelError::Config(
                "handshake.max_verification_attempts must be at least 1".to_string(),
            ));
        }
        if self.proctor.gaze_off_threshold_secs <= 0.0 {
            return Err(SentinelError::Config(
                "proctor.gaze_off_threshold_secs must be positive".to_string(),
            ));
        }
        if self.sessions.sweep_interval_secs == 0 {
            return Err(SentinelError::Config(
                "sessions.sweep_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            redis_url: None,
            upload_dir: default_upload_dir(),
            handshake: HandshakeConfig::default(),
            proctor: ProctorConfig::default(),
            vision: VisionConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}
