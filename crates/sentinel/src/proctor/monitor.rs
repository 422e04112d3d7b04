//! Live proctoring loop.

use chrono::{DateTime, Utc};
use sentinel_common::{
    Alert, AlertKind, Detection, Gaze, HeadPose, LogEntry, ProctorStatus, ProctorUpdate,
    SentinelError,
};
use std::sync::Arc;
use std::time::Duration;

use super::rules::{FrameRule, build_rules};
use super::session::ProctoringSession;
use crate::config::ProctorConfig;
use crate::frame::Frame;
use crate::journal::EventJournal;
use crate::stats::ServiceStats;
use crate::store::SessionStore;
use crate::vision::{self, VisionEngine};

/// Live proctoring service
pub struct ProctorService {
    sessions: SessionStore<ProctoringSession>,
    vision: Arc<dyn VisionEngine>,
    config: ProctorConfig,
    rules: Vec<Box<dyn FrameRule>>,
    journal: EventJournal,
    stats: Arc<ServiceStats>,
}

impl ProctorService {
    pub fn new(
        config: ProctorConfig,
        vision: Arc<dyn VisionEngine>,
        journal: EventJournal,
        stats: Arc<ServiceStats>,
    ) -> Self {
        let rules = build_rules(&config);
        tracing::debug!(
            rules = ?rules.iter().map(|r| r.name()).collect::<Vec<_>>(),
            "Proctoring rules installed"
        );

        Self {
            sessions: SessionStore::new(),
            vision,
            config,
            rules,
            journal,
            stats,
        }
    }

    /// Process a frame stamped with the wall clock
    pub async fn process_frame(&self, session_id: &str, frame: Frame) -> ProctorUpdate {
        self.process_frame_at(session_id, frame, Utc::now()).await
    }

    /// Process one frame observed at `now`.
    ///
    /// Frames for a session must arrive in timestamp order for gaze-away
    /// time to mean anything.
    pub async fn process_frame_at(
        &self,
        session_id: &str,
        frame: Frame,
        now: DateTime<Utc>,
    ) -> ProctorUpdate {
        let mut session = self
            .sessions
            .lock_or_insert_with(session_id, || {
                tracing::info!(session_id = %session_id, "Proctoring session started");
                ProctoringSession::new(session_id, now)
            })
            .await;

        let dt = session.advance_clock(now);
        ServiceStats::incr(&self.stats.frames_processed);

        let vision = self.vision.clone();
        let observed = tokio::task::spawn_blocking(move || {
            let pose = vision.head_pose(&frame);
            let detections = vision.detect_objects(&frame);
            (pose, detections)
        })
        .await;

        let (pose, detections): (HeadPose, Vec<Detection>) = match observed {
            Ok(o) => o,
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Vision task failed");
                return ProctorUpdate {
                    status: ProctorStatus::Clean,
                    alerts: Vec::new(),
                    session_summary: session.summary(),
                };
            }
        };

        let mut alerts = Vec::new();

        match vision::classify_gaze(&pose, self.config.gaze_angle_limit_deg) {
            Gaze::Off => {
                session.off_screen_duration += dt;
                if session.off_screen_duration > self.config.gaze_off_threshold_secs {
                    session.off_screen_duration = 0.0;
                    alerts.push(Alert::new(
                        AlertKind::YellowFlag,
                        format!(
                            "User looking away (>{}s)",
                            self.config.gaze_off_threshold_secs
                        ),
                    ));
                }
            }
            Gaze::Center => session.off_screen_duration = 0.0,
        }

        for rule in &self.rules {
            alerts.extend(rule.evaluate(&detections));
        }

        let entries: Vec<LogEntry> = alerts.iter().map(|a| session.raise(a, now)).collect();
        let summary = session.summary();
        drop(session);

        for entry in &entries {
            match entry.kind {
                AlertKind::RedFlag => ServiceStats::incr(&self.stats.red_flags),
                AlertKind::YellowFlag | AlertKind::Warning => {
                    ServiceStats::incr(&self.stats.yellow_flags)
                }
            }
            tracing::warn!(
                session_id = %session_id,
                kind = ?entry.kind,
                reason = %entry.reason,
                "Proctoring flag raised"
            );
            self.journal.record_log(session_id, entry).await;
        }

        ProctorUpdate {
            status: if alerts.is_empty() {
                ProctorStatus::Clean
            } else {
                ProctorStatus::Warning
            },
            alerts,
            session_summary: summary,
        }
    }

    /// Record a client-side tab visibility change. Sessions are not created
    /// here; events for unknown sessions are ignored.
    pub async fn log_focus_event(&self, session_id: &str, event_type: &str) {
        let Some(mut session) = self.sessions.lock(session_id).await else {
            tracing::debug!(session_id = %session_id, "Focus event for unknown session ignored");
            return;
        };

        let alert = Alert::new(
            AlertKind::Warning,
            format!("Tab visibility change: {}", event_type),
        );
        let entry = session.raise(&alert, Utc::now());
        drop(session);

        ServiceStats::incr(&self.stats.yellow_flags);
        tracing::warn!(session_id = %session_id, event_type = %event_type, "Session focus lost");
        self.journal.record_log(session_id, &entry).await;
    }

    /// Snapshot of a session including its full log
    pub async fn session_report(&self, session_id: &str) -> Result<ProctoringSession, SentinelError> {
        self.sessions
            .snapshot(session_id)
            .await
            .ok_or_else(|| SentinelError::SessionNotFound(session_id.to_string()))
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.len().await
    }

    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        self.sessions
            .evict_idle(ttl, |session_id, session| {
                tracing::debug!(
                    session_id = %session_id,
                    yellow_flags = session.yellow_flags,
                    red_flags = session.red_flags,
                    "Evicting idle proctoring session"
                );
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::test_support::blank_frame;
    use crate::vision::testing::ScriptedVision;
    use chrono::Duration as ChronoDuration;

    fn service(vision: Arc<ScriptedVision>, config: ProctorConfig) -> ProctorService {
        ProctorService::new(
            config,
            vision,
            EventJournal::disabled(),
            Arc::new(ServiceStats::default()),
        )
    }

    fn at(t0: DateTime<Utc>, millis: i64) -> DateTime<Utc> {
        t0 + ChronoDuration::milliseconds(millis)
    }

    #[tokio::test]
    async fn test_gaze_flag_on_crossing_frame() {
        let vision = Arc::new(ScriptedVision::new());
        let proctor = service(vision.clone(), ProctorConfig::default());
        let t0 = Utc::now();

        for _ in 0..3 {
            vision.push_pose(40.0, 0.0);
        }

        let r = proctor.process_frame_at("s1", blank_frame(), t0).await;
        assert_eq!(r.status, ProctorStatus::Clean);
        let r = proctor.process_frame_at("s1", blank_frame(), at(t0, 1500)).await;
        assert_eq!(r.status, ProctorStatus::Clean);
        let r = proctor.process_frame_at("s1", blank_frame(), at(t0, 3100)).await;
        assert_eq!(r.status, ProctorStatus::Warning);
        assert_eq!(r.alerts.len(), 1);
        assert_eq!(r.alerts[0].kind, AlertKind::YellowFlag);
        assert_eq!(r.alerts[0].reason, "User looking away (>3s)");
        assert_eq!(r.session_summary.yellow_flags, 1);

        let report = proctor.session_report("s1").await.unwrap();
        assert_eq!(report.off_screen_duration, 0.0);
        assert_eq!(report.logs.len(), 1);
    }

    #[tokio::test]
    async fn test_exactly_threshold_does_not_flag() {
        let vision = Arc::new(ScriptedVision::new());
        let proctor = service(vision.clone(), ProctorConfig::default());
        let t0 = Utc::now();

        vision.push_pose(0.0, 40.0);
        vision.push_pose(0.0, 40.0);
        proctor.process_frame_at("s1", blank_frame(), t0).await;
        let r = proctor.process_frame_at("s1", blank_frame(), at(t0, 3000)).await;
        assert!(r.alerts.is_empty());
    }

    #[tokio::test]
    async fn test_center_frame_resets_timer() {
        let vision = Arc::new(ScriptedVision::new());
        let proctor = service(vision.clone(), ProctorConfig::default());
        let t0 = Utc::now();

        vision.push_pose(40.0, 0.0);
        vision.push_pose(40.0, 0.0);
        vision.push_pose(0.0, 0.0);
        vision.push_pose(40.0, 0.0);

        proctor.process_frame_at("s1", blank_frame(), t0).await;
        proctor.process_frame_at("s1", blank_frame(), at(t0, 2500)).await;
        assert!(proctor.session_report("s1").await.unwrap().off_screen_duration > 2.0);

        proctor.process_frame_at("s1", blank_frame(), at(t0, 2600)).await;
        assert_eq!(proctor.session_report("s1").await.unwrap().off_screen_duration, 0.0);

        // 2.0s more off-screen is not enough after the reset
        let r = proctor.process_frame_at("s1", blank_frame(), at(t0, 4600)).await;
        assert!(r.alerts.is_empty());
        assert_eq!(r.session_summary.yellow_flags, 0);
    }

    #[tokio::test]
    async fn test_undetected_face_counts_as_away() {
        let vision = Arc::new(ScriptedVision::new());
        let proctor = service(vision.clone(), ProctorConfig::default());
        let t0 = Utc::now();

        vision.push_undetected();
        vision.push_undetected();
        proctor.process_frame_at("s1", blank_frame(), t0).await;
        let r = proctor.process_frame_at("s1", blank_frame(), at(t0, 3500)).await;
        assert_eq!(r.session_summary.yellow_flags, 1);
    }

    #[tokio::test]
    async fn test_contraband() {
        let vision = Arc::new(ScriptedVision::new());
        let proctor = service(vision.clone(), ProctorConfig::default());

        vision.push_detections(vec![Detection::new("cell phone", 0.9)]);
        let r = proctor.process_frame("s1", blank_frame()).await;
        assert_eq!(r.status, ProctorStatus::Warning);
        assert_eq!(r.alerts.len(), 1);
        assert_eq!(r.alerts[0].kind, AlertKind::RedFlag);
        assert_eq!(r.session_summary.red_flags, 1);

        vision.push_detections(vec![
            Detection::new("book", 0.8),
            Detection::new("cell phone", 0.7),
            Detection::new("person", 0.99),
            Detection::new("person", 0.95),
        ]);
        let r = proctor.process_frame("s1", blank_frame()).await;
        assert_eq!(r.alerts.len(), 2);
        assert_eq!(r.session_summary.red_flags, 3);
        assert_eq!(r.session_summary.yellow_flags, 0);

        let r = proctor.process_frame("s1", blank_frame()).await;
        assert_eq!(r.status, ProctorStatus::Clean);
        assert!(r.alerts.is_empty());
        assert_eq!(r.session_summary.red_flags, 3);
    }

    #[tokio::test]
    async fn test_multi_person_rule_when_configured() {
        let vision = Arc::new(ScriptedVision::new());
        let config = ProctorConfig {
            max_persons: Some(1),
            ..Default::default()
        };
        let proctor = service(vision.clone(), config);

        vision.push_detections(vec![Detection::new("person", 0.9), Detection::new("person", 0.9)]);
        let r = proctor.process_frame("s1", blank_frame()).await;
        assert_eq!(r.alerts.len(), 1);
        assert_eq!(r.session_summary.yellow_flags, 1);
    }

    #[tokio::test]
    async fn test_flags_never_decrease() {
        let vision = Arc::new(ScriptedVision::new());
        let proctor = service(vision.clone(), ProctorConfig::default());
        let t0 = Utc::now();

        let mut last = (0, 0);
        for i in 0..12i64 {
            if i % 3 == 0 {
                vision.push_detections(vec![Detection::new("book", 0.5)]);
            }
            if i % 2 == 0 {
                vision.push_pose(50.0, 0.0);
            } else {
                vision.push_pose(0.0, 0.0);
            }
            let r = proctor.process_frame_at("s1", blank_frame(), at(t0, i * 2000)).await;
            let now = (r.session_summary.yellow_flags, r.session_summary.red_flags);
            assert!(now.0 >= last.0 && now.1 >= last.1);
            last = now;
        }
        assert_eq!(last.1, 4);
    }

    #[tokio::test]
    async fn test_focus_event_requires_session() {
        let vision = Arc::new(ScriptedVision::new());
        let proctor = service(vision, ProctorConfig::default());

        proctor.log_focus_event("s1", "hidden").await;
        assert!(proctor.session_report("s1").await.is_err());
        assert_eq!(proctor.active_sessions().await, 0);

        proctor.process_frame("s1", blank_frame()).await;
        proctor.log_focus_event("s1", "hidden").await;

        let report = proctor.session_report("s1").await.unwrap();
        assert_eq!(report.yellow_flags, 1);
        assert_eq!(report.logs.len(), 1);
        assert_eq!(report.logs[0].kind, AlertKind::Warning);
        assert_eq!(report.logs[0].reason, "Tab visibility change: hidden");
    }

    #[tokio::test]
    async fn test_evict_idle_sessions() {
        let vision = Arc::new(ScriptedVision::new());
        let proctor = service(vision, ProctorConfig::default());
        proctor.process_frame("s1", blank_frame()).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(proctor.evict_idle(Duration::from_millis(5)).await, 1);
        assert_eq!(proctor.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_report_polling_does_not_keep_session_alive() {
        let vision = Arc::new(ScriptedVision::new());
        let proctor = service(vision, ProctorConfig::default());
        proctor.process_frame("s1", blank_frame()).await;

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            proctor.session_report("s1").await.unwrap();
        }

        assert_eq!(proctor.evict_idle(Duration::from_millis(15)).await, 1);
        assert!(proctor.session_report("s1").await.is_err());
    }
}
