//! # Sentinel - Interview Proctoring Engine
//!
//! Identity handshake (liveness challenges + face cross-verification) and
//! live proctoring (gaze tracking, contraband detection, focus telemetry)
//! for online interviews.
//!
//! ## Architecture
//! ```text
//! Browser ──WS/HTTP──→ Sentinel ──→ Vision sidecar (pose / detect / compare)
//!                         ↓
//!                      Redis (event journal, optional)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;
mod frame;
mod identity;
mod journal;
mod proctor;
mod routes;
mod state;
mod stats;
mod store;
mod sweeper;
mod vision;

use config::AppConfig;
use state::AppState;

/// Sentinel - Interview Proctoring Engine
#[derive(Parser, Debug)]
#[command(name = "sentinel")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/sentinel.toml")]
    config: String,

    /// Redis URL for the event journal (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Directory for reference images and captured frames (overrides config)
    #[arg(long, env = "SENTINEL_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!(
        "👁️ Starting Sentinel v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!("📋 Configuration loaded from {}", args.config);

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create upload dir {}", config.upload_dir.display()))?;

    // Select vision backend (the sidecar health check blocks)
    let vision_config = config.vision.clone();
    let vision = tokio::task::spawn_blocking(move || vision::select_engine(&vision_config))
        .await
        .context("Vision backend selection panicked")?;
    info!("🔭 Vision backend: {}", vision.name());

    // Initialize application state
    let state = AppState::new(config.clone(), vision).await?;
    if state.journal.is_enabled() {
        info!("✅ Redis journal connected");
    } else {
        info!("Redis journal disabled");
    }

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Spawn idle session sweeper
    let sweeper_state = state.clone();
    let sweeper_shutdown = shutdown_tx.subscribe();
    tokio::spawn(async move {
        sweeper::session_sweeper(sweeper_state, sweeper_shutdown).await;
    });

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("🚀 Sentinel listening on {}", config.listen_addr);

    // Handle graceful shutdown
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("🛑 Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("👋 Sentinel shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
