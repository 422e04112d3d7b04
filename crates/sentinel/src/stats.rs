//! Runtime counters exposed on `/metrics`.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Service-wide counters
#[derive(Default)]
pub struct ServiceStats {
    /// Proctoring frames processed
    pub frames_processed: AtomicU64,
    /// Frames dropped (missing payload or undecodable)
    pub frames_dropped: AtomicU64,
    /// Handshake frames evaluated
    pub handshake_frames: AtomicU64,
    /// Handshakes initiated
    pub handshakes_started: AtomicU64,
    /// Handshakes that reached `verified`
    pub identities_verified: AtomicU64,
    /// Handshakes that reached `failed`
    pub identities_failed: AtomicU64,
    /// Yellow flags raised (gaze, focus, multi-person)
    pub yellow_flags: AtomicU64,
    /// Red flags raised
    pub red_flags: AtomicU64,
    /// Sessions removed by the idle sweeper
    pub sessions_evicted: AtomicU64,
}

impl ServiceStats {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Get statistics snapshot
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            handshake_frames: self.handshake_frames.load(Ordering::Relaxed),
            handshakes_started: self.handshakes_started.load(Ordering::Relaxed),
            identities_verified: self.identities_verified.load(Ordering::Relaxed),
            identities_failed: self.identities_failed.load(Ordering::Relaxed),
            yellow_flags: self.yellow_flags.load(Ordering::Relaxed),
            red_flags: self.red_flags.load(Ordering::Relaxed),
            sessions_evicted: self.sessions_evicted.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of service statistics
#[derive(Clone, Debug, Default, Serialize)]
pub struct StatsSnapshot {
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub handshake_frames: u64,
    pub handshakes_started: u64,
    pub identities_verified: u64,
    pub identities_failed: u64,
    pub yellow_flags: u64,
    pub red_flags: u64,
    pub sessions_evicted: u64,
}
