//! Detection wire protocol
//!
//! Tolerant decoder for the JSON detection messages carried on the data
//! channel, plus the presentation-side tracker that enforces the
//! replace-don't-merge contract.

pub mod parser;
pub mod tracker;

pub use parser::{parse_message, InboundMessage};
pub use tracker::DetectionTracker;

use serde::{Deserialize, Serialize};

/// Label used when a detection carries no usable class name
pub const UNKNOWN_LABEL: &str = "unknown";

/// One normalized detection record
///
/// Unit contract: `x`/`y`/`width`/`height` are in the sender's source
/// pixel space, origin top-left; `confidence` is in [0, 1]. The parser
/// applies no scaling or offset; presentation owns that mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    pub class_id: i64,
    pub class_name: String,
}

impl Detection {
    /// Overlay label in the form `"{id}, {name}, {conf:.2}"`
    pub fn label(&self) -> String {
        format!("{}, {}, {:.2}", self.class_id, self.class_name, self.confidence)
    }
}

/// All detections decoded from one inbound message, in wire order
///
/// A frame supersedes the previous one completely; consumers replace
/// their state on every frame instead of merging.
#[derive(Debug, Clone, Default)]
pub struct DetectionFrame {
    pub detections: Vec<Detection>,
}

impl DetectionFrame {
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }
}

/// Flat detection object as it appears on the wire
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireDetection {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub height: f32,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub class_id: i64,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub classification: Option<WireClassification>,
}

/// Legacy/variant classification sub-object
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct WireClassification {
    #[serde(default)]
    pub class_id: i64,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub confidence: f32,
}

fn resolve_name(name: Option<String>) -> String {
    match name {
        Some(n) if !n.trim().is_empty() => n,
        _ => UNKNOWN_LABEL.to_string(),
    }
}

impl WireDetection {
    /// Normalize one wire object into a [`Detection`]
    ///
    /// `has_classification` reflects key presence in the raw message.
    /// Presence, not value, decides precedence: a present-but-null
    /// `classification` still supersedes the flat fields and resolves
    /// to the `"unknown"` label with zeroed id/confidence.
    pub fn normalize(self, has_classification: bool) -> Detection {
        let (class_id, class_name, confidence) = if has_classification {
            let c = self.classification.unwrap_or_default();
            (c.class_id, resolve_name(c.class_name), c.confidence)
        } else {
            (self.class_id, resolve_name(self.class_name), self.confidence)
        };

        Detection {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            confidence,
            class_id,
            class_name,
        }
    }
}
