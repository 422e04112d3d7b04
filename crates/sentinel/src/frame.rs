//! Decoded video frames and on-disk image handles.

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, RgbImage};
use sentinel_common::SentinelError;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// A single decoded RGB frame
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Decode a `data:image/...;base64,<payload>` URL or a bare base64 payload.
    pub fn decode_data_url(data: &str) -> Result<Self, SentinelError> {
        let payload = match data.split_once(',') {
            Some((header, payload)) if header.starts_with("data:") => payload,
            Some(_) => {
                return Err(SentinelError::FrameDecode(
                    "malformed data URL header".to_string(),
                ));
            }
            None => data,
        };

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| SentinelError::FrameDecode(e.to_string()))?;

        Self::decode_bytes(&bytes)
    }

    /// Decode raw encoded image bytes (JPEG, PNG, ...)
    pub fn decode_bytes(bytes: &[u8]) -> Result<Self, SentinelError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| SentinelError::FrameDecode(e.to_string()))?;
        Ok(Self {
            image: image.to_rgb8(),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Encode as JPEG bytes
    pub fn to_jpeg(&self) -> Result<Vec<u8>, SentinelError> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(self.image.clone())
            .write_to(&mut buf, ImageFormat::Jpeg)
            .map_err(|e| SentinelError::Storage(e.to_string()))?;
        Ok(buf.into_inner())
    }

    /// Persist as JPEG at `path`
    pub fn save_jpeg(&self, path: &Path) -> Result<(), SentinelError> {
        self.image
            .save_with_format(path, ImageFormat::Jpeg)
            .map_err(|e| SentinelError::Storage(format!("{}: {}", path.display(), e)))
    }
}

/// File-name stem for a session. Session ids are caller-supplied, so they
/// never reach the filesystem raw.
pub fn session_file_stem(session_id: &str) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let digest = Sha256::digest(session_id.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..12])
}

/// `{upload_dir}/{stem}_{suffix}.jpg`
pub fn session_file_path(upload_dir: &Path, session_id: &str, suffix: &str) -> PathBuf {
    upload_dir.join(format!("{}_{}.jpg", session_file_stem(session_id), suffix))
}
