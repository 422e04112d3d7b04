//! Deterministic vision backend for state-machine tests.

use sentinel_common::{Detection, FaceMatch, HeadPose};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use super::VisionEngine;
use crate::frame::Frame;

/// Replays queued poses and detections; face comparisons return fixed scores
/// chosen by whether the reference image is the ID card.
pub struct ScriptedVision {
    poses: Mutex<VecDeque<HeadPose>>,
    detections: Mutex<VecDeque<Vec<Detection>>>,
    id_similarity: Mutex<f64>,
    live_similarity: Mutex<f64>,
    pub compare_calls: AtomicU32,
}

impl ScriptedVision {
    pub fn new() -> Self {
        Self {
            poses: Mutex::new(VecDeque::new()),
            detections: Mutex::new(VecDeque::new()),
            id_similarity: Mutex::new(0.0),
            live_similarity: Mutex::new(0.0),
            compare_calls: AtomicU32::new(0),
        }
    }

    pub fn push_pose(&self, yaw: f64, pitch: f64) {
        self.poses.lock().unwrap().push_back(HeadPose::new(yaw, pitch));
    }

    pub fn push_undetected(&self) {
        self.poses.lock().unwrap().push_back(HeadPose::undetected());
    }

    pub fn push_detections(&self, detections: Vec<Detection>) {
        self.detections.lock().unwrap().push_back(detections);
    }

    pub fn set_similarities(&self, id: f64, live: f64) {
        *self.id_similarity.lock().unwrap() = id;
        *self.live_similarity.lock().unwrap() = live;
    }

    pub fn compare_count(&self) -> u32 {
        self.compare_calls.load(Ordering::SeqCst)
    }
}

impl VisionEngine for ScriptedVision {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn head_pose(&self, _frame: &Frame) -> HeadPose {
        self.poses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| HeadPose::new(0.0, 0.0))
    }

    fn detect_objects(&self, _frame: &Frame) -> Vec<Detection> {
        self.detections.lock().unwrap().pop_front().unwrap_or_default()
    }

    fn compare_faces(&self, reference: &Path, _sample: &Path) -> FaceMatch {
        self.compare_calls.fetch_add(1, Ordering::SeqCst);
        let is_id = reference
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with("_id.jpg"));
        let similarity = if is_id {
            *self.id_similarity.lock().unwrap()
        } else {
            *self.live_similarity.lock().unwrap()
        };
        FaceMatch {
            similarity,
            verified: similarity >= 0.5,
        }
    }
}
