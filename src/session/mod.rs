//! Peer session management
//!
//! Owns the peer connection, drives the offer/answer negotiation state
//! machine and the data-channel lifecycle, and feeds inbound bytes into
//! the detection pipeline.

pub mod manager;
pub mod pipeline;
pub mod track;

pub use manager::PeerSessionManager;
pub use pipeline::DetectionPipeline;
pub use track::OutboundVideoTrack;

use serde::{Deserialize, Serialize};

/// Negotiation state of one session
///
/// Exactly one instance per session, owned by the session manager.
/// Only the negotiation flow transitions it, except the observational
/// `Connected -> Disconnected` edge reported by the ICE state callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    AwaitingLocalMedia,
    NegotiatingOffer,
    AwaitingAnswer,
    Connected,
    Disconnected,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::AwaitingLocalMedia => write!(f, "awaiting-local-media"),
            SessionState::NegotiatingOffer => write!(f, "negotiating-offer"),
            SessionState::AwaitingAnswer => write!(f, "awaiting-answer"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Whether an SDP answer carries a video media section
///
/// The server signals video support with an `m=video` line; an answer
/// without one means no media will flow and the negotiation attempt is
/// terminal.
pub fn answer_includes_video(sdp: &str) -> bool {
    sdp.contains("m=video")
}
