//! Idle session eviction.

use std::time::Duration;

use crate::state::AppState;
use crate::stats::ServiceStats;

/// Background worker that evicts idle handshake and proctoring sessions
pub async fn session_sweeper(state: AppState, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
    let interval = Duration::from_secs(state.config.sessions.sweep_interval_secs);
    let ttl = Duration::from_secs(state.config.sessions.idle_ttl_secs);

    tracing::info!(interval = ?interval, ttl = ?ttl, "🧹 Session sweeper started");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                sweep(&state, ttl).await;
            }
            _ = shutdown.recv() => {
                tracing::info!("🧹 Session sweeper shutting down");
                break;
            }
        }
    }
}

/// One eviction pass over both session tables
pub async fn sweep(state: &AppState, ttl: Duration) -> usize {
    let handshakes = state.identity.evict_idle(ttl).await;
    let proctoring = state.proctor.evict_idle(ttl).await;
    let total = handshakes + proctoring;

    if total > 0 {
        ServiceStats::add(&state.stats.sessions_evicted, total as u64);
        tracing::info!(
            handshakes = handshakes,
            proctoring = proctoring,
            "Evicted idle sessions"
        );
    }

    total
}
