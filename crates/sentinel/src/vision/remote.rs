//! Inference sidecar client.
//!
//! The pose/detection/face models run out of process. This backend talks to
//! the sidecar over HTTP with base64 JPEG payloads:
//!
//! ```text
//! GET  /health
//! POST /pose     {image}             -> {yaw, pitch, detected}
//! POST /detect   {image}             -> {detections: [{label, confidence}]}
//! POST /compare  {reference, sample} -> {similarity, verified}
//! ```

use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::blocking::Client;
use sentinel_common::{Detection, FaceMatch, HeadPose};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::VisionEngine;
use crate::config::VisionConfig;
use crate::frame::Frame;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Sidecar returned status {0}")]
    Status(u16),
}

#[derive(Serialize)]
struct ImageRequest {
    image: String,
}

#[derive(Serialize)]
struct CompareRequest {
    reference: String,
    sample: String,
}

#[derive(Deserialize)]
struct DetectResponse {
    detections: Vec<Detection>,
}

/// Vision backend backed by an HTTP inference sidecar
pub struct RemoteVision {
    client: Client,
    endpoint: String,
}

impl RemoteVision {
    /// Build the client and check `GET /health`
    pub fn connect(config: &VisionConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        let remote = Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        };

        let status = remote.client.get(remote.url("health")).send()?.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }

        Ok(remote)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, RemoteError> {
        let response = self.client.post(self.url(path)).json(body).send()?;
        if !response.status().is_success() {
            return Err(RemoteError::Status(response.status().as_u16()));
        }
        Ok(response.json()?)
    }

    fn encode_frame(frame: &Frame) -> Result<String, RemoteError> {
        let jpeg = frame
            .to_jpeg()
            .map_err(|e| RemoteError::Image(e.to_string()))?;
        Ok(STANDARD.encode(jpeg))
    }

    fn encode_file(path: &Path) -> Result<String, RemoteError> {
        let bytes = std::fs::read(path)
            .map_err(|e| RemoteError::Image(format!("{}: {}", path.display(), e)))?;
        Ok(STANDARD.encode(bytes))
    }

    fn try_head_pose(&self, frame: &Frame) -> Result<HeadPose, RemoteError> {
        let image = Self::encode_frame(frame)?;
        self.post("pose", &ImageRequest { image })
    }

    fn try_detect(&self, frame: &Frame) -> Result<Vec<Detection>, RemoteError> {
        let image = Self::encode_frame(frame)?;
        let response: DetectResponse = self.post("detect", &ImageRequest { image })?;
        Ok(response.detections)
    }

    fn try_compare(&self, reference: &Path, sample: &Path) -> Result<FaceMatch, RemoteError> {
        let request = CompareRequest {
            reference: Self::encode_file(reference)?,
            sample: Self::encode_file(sample)?,
        };
        let result: FaceMatch = self.post("compare", &request)?;
        Ok(normalize_match(result))
    }
}

/// Clamp similarity into [0, 1]. A non-finite score carries no information
/// and becomes the negative result.
fn normalize_match(result: FaceMatch) -> FaceMatch {
    if !result.similarity.is_finite() {
        tracing::warn!(similarity = result.similarity, "Sidecar returned a non-finite similarity");
        return FaceMatch::none();
    }
    FaceMatch {
        similarity: result.similarity.clamp(0.0, 1.0),
        ..result
    }
}

impl VisionEngine for RemoteVision {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn head_pose(&self, frame: &Frame) -> HeadPose {
        self.try_head_pose(frame).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Head pose request failed");
            HeadPose::undetected()
        })
    }

    fn detect_objects(&self, frame: &Frame) -> Vec<Detection> {
        self.try_detect(frame).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Object detection request failed");
            Vec::new()
        })
    }

    fn compare_faces(&self, reference: &Path, sample: &Path) -> FaceMatch {
        self.try_compare(reference, sample).unwrap_or_else(|e| {
            tracing::warn!(
                reference = ?reference,
                sample = ?sample,
                error = %e,
                "Face comparison failed"
            );
            FaceMatch::none()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_match(similarity: f64, verified: bool) -> FaceMatch {
        FaceMatch {
            similarity,
            verified,
        }
    }

    #[test]
    fn test_similarity_is_clamped() {
        assert_eq!(normalize_match(face_match(1.4, true)), face_match(1.0, true));
        assert_eq!(normalize_match(face_match(-0.2, false)), face_match(0.0, false));
        assert_eq!(normalize_match(face_match(0.42, false)), face_match(0.42, false));
    }

    #[test]
    fn test_non_finite_similarity_is_negative() {
        assert_eq!(normalize_match(face_match(f64::NAN, true)), FaceMatch::none());
        assert_eq!(normalize_match(face_match(f64::INFINITY, true)), FaceMatch::none());
        assert_eq!(normalize_match(face_match(f64::NEG_INFINITY, false)), FaceMatch::none());
    }

    #[test]
    fn test_connect_refused_is_error() {
        let config = VisionConfig {
            endpoint: "http://127.0.0.1:1/".to_string(),
            timeout_ms: 200,
            ..Default::default()
        };
        assert!(RemoteVision::connect(&config).is_err());
    }
}
