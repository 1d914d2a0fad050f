//! Outbound RTP video track
//!
//! Wraps a static RTP track so the copy loop can push encoded frames
//! without knowing anything about the peer connection that consumes it.

use std::sync::Arc;

use tracing::trace;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocalWriter;

use crate::error::Result;
use crate::video::VideoFrame;

/// Keep RTP payloads below the usual path MTU
const MAX_PAYLOAD_SIZE: usize = 1200;

pub struct OutboundVideoTrack {
    track: Arc<TrackLocalStaticRTP>,
}

impl OutboundVideoTrack {
    pub fn new(track_id: &str, stream_id: &str) -> Self {
        let capability = RTCRtpCodecCapability {
            mime_type: "video/H264".to_string(),
            clock_rate: 90000,
            channels: 0,
            sdp_fmtp_line: "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f"
                .to_string(),
            rtcp_feedback: vec![],
        };
        Self {
            track: Arc::new(TrackLocalStaticRTP::new(
                capability,
                track_id.to_string(),
                stream_id.to_string(),
            )),
        }
    }

    /// The underlying track, for `add_track`
    pub fn rtp_track(&self) -> Arc<TrackLocalStaticRTP> {
        self.track.clone()
    }

    /// Write one encoded frame to the track, chunked to the MTU
    pub async fn write_frame(&self, frame: &VideoFrame) -> Result<()> {
        let data = frame.data();
        for chunk in data.chunks(MAX_PAYLOAD_SIZE) {
            self.track.write(chunk).await?;
        }
        trace!(
            "Wrote frame {} ({} bytes) to outbound track",
            frame.sequence,
            data.len()
        );
        Ok(())
    }
}
