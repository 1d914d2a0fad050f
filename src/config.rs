//! Client configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client configuration
///
/// Covers the signaling endpoints, ICE servers and the timing knobs of
/// the session. All durations are stored as plain millisecond fields so
/// the struct round-trips through JSON without custom serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Signaling endpoint for the offer/answer exchange
    pub signaling_url: String,
    /// Signaling endpoint for trickled ICE candidates
    pub signaling_ice_url: String,
    /// STUN server URLs
    ///
    /// Empty means host candidates only, which is enough for
    /// same-network deployments.
    pub stun_servers: Vec<String>,
    /// Accept self-signed certificates on the signaling endpoint
    pub accept_invalid_certs: bool,
    /// Label of the outbound detection data channel
    pub data_channel_label: String,
    /// Application protocol tag carried by the data channel
    pub data_channel_protocol: String,
    /// How long to wait for the video source before giving up (ms)
    pub media_timeout_ms: u64,
    /// Cadence of the camera-to-track copy loop (ms)
    pub frame_interval_ms: u64,
    /// How long a detection overlay survives without fresh detections (ms)
    pub overlay_grace_ms: u64,
    /// Cap applied by detection consumers, not by the parser
    pub max_boxes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signaling_url: "http://127.0.0.1:8080/offer".to_string(),
            signaling_ice_url: "http://127.0.0.1:8080/candidate".to_string(),
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            accept_invalid_certs: false,
            data_channel_label: "detections".to_string(),
            data_channel_protocol: "json".to_string(),
            media_timeout_ms: 10_000,
            frame_interval_ms: 33,
            overlay_grace_ms: 3_000,
            max_boxes: 200,
        }
    }
}

impl ClientConfig {
    /// Media readiness timeout as a [`Duration`]
    pub fn media_timeout(&self) -> Duration {
        Duration::from_millis(self.media_timeout_ms)
    }

    /// Frame copy cadence as a [`Duration`]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Overlay grace period as a [`Duration`]
    pub fn overlay_grace(&self) -> Duration {
        Duration::from_millis(self.overlay_grace_ms)
    }
}
