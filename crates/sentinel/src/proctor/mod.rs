//! Live proctoring.
//!
//! Consumes the interview's frame stream, tracks continuous gaze-away time,
//! and applies object rules to every frame, raising yellow and red flags.

mod monitor;
mod rules;
mod session;

pub use monitor::ProctorService;
pub use session::ProctoringSession;
