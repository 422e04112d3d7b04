//! Identity handshake.
//!
//! Drives a candidate through the liveness challenges, keeps one captured
//! frame per challenge, and cross-verifies the centered capture against the
//! uploaded profile photo and government ID.

mod handshake;
mod session;

pub use handshake::IdentityService;
pub use session::HandshakeStatusView;
