//! Proctoring session record.

use chrono::{DateTime, Utc};
use sentinel_common::{Alert, AlertKind, LogEntry, SessionSummary};
use serde::Serialize;

/// Live monitoring state for one interview
#[derive(Debug, Clone, Serialize)]
pub struct ProctoringSession {
    pub session_id: String,
    /// Never decreases
    pub yellow_flags: u32,
    /// Never decreases
    pub red_flags: u32,
    /// Continuous gaze-away seconds since the last centered frame or flag
    pub off_screen_duration: f64,
    pub last_processed_time: DateTime<Utc>,
    pub frames_processed: u64,
    pub logs: Vec<LogEntry>,
    pub created_at: DateTime<Utc>,
}

impl ProctoringSession {
    pub fn new(session_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.to_string(),
            yellow_flags: 0,
            red_flags: 0,
            off_screen_duration: 0.0,
            last_processed_time: now,
            frames_processed: 0,
            logs: Vec::new(),
            created_at: now,
        }
    }

    /// Seconds since the previous frame; moves the clock to `now`.
    /// A clock that went backwards contributes nothing.
    pub fn advance_clock(&mut self, now: DateTime<Utc>) -> f64 {
        let elapsed = now - self.last_processed_time;
        self.last_processed_time = now;
        self.frames_processed += 1;

        match elapsed.to_std() {
            Ok(d) => d.as_secs_f64(),
            Err(_) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    "Frame timestamp earlier than previous frame"
                );
                0.0
            }
        }
    }

    /// Count the alert against the session and append it to the log
    pub fn raise(&mut self, alert: &Alert, now: DateTime<Utc>) -> LogEntry {
        match alert.kind {
            AlertKind::YellowFlag | AlertKind::Warning => self.yellow_flags += 1,
            AlertKind::RedFlag => self.red_flags += 1,
        }
        let entry = LogEntry::from_alert(now, alert);
        self.logs.push(entry.clone());
        entry
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            yellow_flags: self.yellow_flags,
            red_flags: self.red_flags,
        }
    }
}
