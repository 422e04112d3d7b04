//! # Sentinel Common
//!
//! Shared types, errors, and constants used across Sentinel components.
//!
//! ## Modules
//! - `types` - Domain data (challenge actions, head pose, alerts, result shapes)
//! - `error` - The `SentinelError` taxonomy
//! - `constants` - Protocol thresholds and shared defaults

pub mod constants;
pub mod error;
pub mod types;

pub use error::SentinelError;
pub use types::*;
