//! Application state and shared resources.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::identity::IdentityService;
use crate::journal::EventJournal;
use crate::proctor::ProctorService;
use crate::stats::ServiceStats;
use crate::vision::VisionEngine;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Identity handshake sessions
    pub identity: Arc<IdentityService>,

    /// Live proctoring sessions
    pub proctor: Arc<ProctorService>,

    /// Vision backend selected at startup
    pub vision: Arc<dyn VisionEngine>,

    /// Redis event journal (no-op without Redis)
    pub journal: EventJournal,

    /// Runtime counters
    pub stats: Arc<ServiceStats>,

    /// Process start, for uptime
    pub started_at: Instant,
}

impl AppState {
    /// Create new application state, connecting to Redis when configured
    pub async fn new(config: AppConfig, vision: Arc<dyn VisionEngine>) -> Result<Self> {
        let journal = match config.redis_url.as_deref() {
            Some(url) => EventJournal::connect(url, config.sessions.idle_ttl_secs).await?,
            None => EventJournal::disabled(),
        };

        Ok(Self::from_parts(config, vision, journal))
    }

    /// Assemble state from already-initialized parts
    pub fn from_parts(config: AppConfig, vision: Arc<dyn VisionEngine>, journal: EventJournal) -> Self {
        let stats = Arc::new(ServiceStats::default());

        let identity = Arc::new(IdentityService::new(
            config.handshake.clone(),
            config.upload_dir.clone(),
            vision.clone(),
            journal.clone(),
            stats.clone(),
        ));
        let proctor = Arc::new(ProctorService::new(
            config.proctor.clone(),
            vision.clone(),
            journal.clone(),
            stats.clone(),
        ));

        Self {
            config,
            identity,
            proctor,
            vision,
            journal,
            stats,
            started_at: Instant::now(),
        }
    }
}
