use std::time::Duration;

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Signaling failed: {0}")]
    Signaling(String),

    #[error("Invalid SDP answer: {0}")]
    InvalidAnswer(String),

    #[error("Media source not ready within {0:?}")]
    MediaTimeout(Duration),

    #[error("WebRTC error: {0}")]
    WebRtc(#[from] webrtc::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, AppError>;
