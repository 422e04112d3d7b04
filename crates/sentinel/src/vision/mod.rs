//! Vision primitive contract.
//!
//! The state machines only ever see three capabilities: head pose, object
//! detection, and face comparison. Which backend provides them is decided
//! once at startup; when nothing is available the [`UnavailableVision`]
//! backend answers every call with a safe negative result.

mod pose;
mod remote;
#[cfg(test)]
pub(crate) mod testing;

pub use pose::{classify_gaze, satisfies};
pub use remote::RemoteVision;

use sentinel_common::{Detection, FaceMatch, HeadPose, SentinelError};
use std::path::Path;
use std::sync::Arc;

use crate::config::{VisionBackend, VisionConfig};
use crate::frame::Frame;

/// Face/pose/object primitive.
///
/// Implementations are blocking CPU or I/O work and are always invoked
/// from the blocking thread pool. They never fail: an unavailable model
/// degrades to [`HeadPose::undetected`], an empty detection list, or
/// [`FaceMatch::none`].
pub trait VisionEngine: Send + Sync {
    /// Backend name for health/metrics output
    fn name(&self) -> &'static str;

    fn head_pose(&self, frame: &Frame) -> HeadPose;

    fn detect_objects(&self, frame: &Frame) -> Vec<Detection>;

    /// Compare the faces in two stored images
    fn compare_faces(&self, reference: &Path, sample: &Path) -> FaceMatch;
}

/// Safe-default backend used when no models are loaded
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableVision;

impl VisionEngine for UnavailableVision {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn head_pose(&self, _frame: &Frame) -> HeadPose {
        HeadPose::undetected()
    }

    fn detect_objects(&self, _frame: &Frame) -> Vec<Detection> {
        Vec::new()
    }

    fn compare_faces(&self, _reference: &Path, _sample: &Path) -> FaceMatch {
        FaceMatch::none()
    }
}

/// Pick the vision backend for this process.
///
/// A remote sidecar that fails its health check is treated as absent.
/// Blocking: call from `spawn_blocking` or before the runtime is busy.
pub fn select_engine(config: &VisionConfig) -> Arc<dyn VisionEngine> {
    match config.backend {
        VisionBackend::None => {
            tracing::warn!("No vision backend configured, using safe defaults");
            Arc::new(UnavailableVision)
        }
        VisionBackend::Remote => match RemoteVision::connect(config) {
            Ok(remote) => {
                tracing::info!(endpoint = %config.endpoint, "Vision sidecar connected");
                Arc::new(remote)
            }
            Err(e) => {
                let error = SentinelError::VisionUnavailable(e.to_string());
                tracing::warn!(
                    endpoint = %config.endpoint,
                    error = %error,
                    retryable = error.is_retryable(),
                    "Vision sidecar unavailable, using safe defaults"
                );
                Arc::new(UnavailableVision)
            }
        },
    }
}
