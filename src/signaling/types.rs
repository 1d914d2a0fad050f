//! Signaling wire types
//!
//! Field names are PascalCase on the wire; that is the server's
//! contract, not a local convention.

use serde::{Deserialize, Serialize};

/// SDP exchanged with the signaling endpoint, verbatim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdpExchange {
    /// SDP text
    #[serde(rename = "Sdp")]
    pub sdp: String,
    /// "offer" or "answer"
    #[serde(rename = "Type")]
    pub kind: String,
}

impl SdpExchange {
    /// Build an offer message
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            kind: "offer".to_string(),
        }
    }
}

/// One locally discovered ICE candidate, pushed out-of-band
///
/// Ownership of a candidate transfers to the transport once sent; the
/// session keeps no record of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidateExchange {
    /// Candidate string
    #[serde(rename = "Candidate")]
    pub candidate: String,
    /// SDP mid (media ID)
    #[serde(rename = "SdpMid")]
    pub sdp_mid: String,
    /// SDP mline index
    #[serde(rename = "SdpMLineIndex")]
    pub sdp_mline_index: u16,
}
