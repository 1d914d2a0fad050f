//! Signaling against the remote inference server
//!
//! Two independent one-shot HTTP calls, not a session API: the
//! offer/answer exchange and the out-of-band ICE candidate push.

pub mod transport;
pub mod types;

pub use transport::SignalingTransport;
pub use types::{IceCandidateExchange, SdpExchange};
