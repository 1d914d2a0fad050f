//! Sightlink - WebRTC live-inference streaming client
//!
//! This crate provides the client side of a remote object-detection
//! link: it streams live video to an inference server over WebRTC,
//! receives detection results on an ordered data channel and fuses the
//! reported inference time with the transport RTT into an end-to-end
//! latency figure.

pub mod config;
pub mod error;
pub mod events;
pub mod latency;
pub mod protocol;
pub mod session;
pub mod signaling;
pub mod stats;
pub mod video;

pub use error::{AppError, Result};
