//! Tolerant decoding of inbound data-channel messages

use tracing::{debug, warn};

use super::{Detection, DetectionFrame, WireDetection};
use crate::error::{AppError, Result};

/// Classification of one inbound message
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// A detection-array message, possibly empty
    Detections(DetectionFrame),
    /// A control/test message (contains `msg`); not an error, carries
    /// no detections
    Control,
}

/// Decode one inbound data-channel message
///
/// A message starting with `[` is a detection array; anything else that
/// mentions `msg` is a control message and is ignored. Everything else
/// is a decode error so the presentation layer can clear its display.
pub fn parse_message(raw: &[u8]) -> Result<InboundMessage> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| AppError::Decode(format!("Message is not UTF-8: {}", e)))?;

    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return Ok(InboundMessage::Detections(parse_detection_array(trimmed)));
    }

    if text.contains("msg") {
        debug!("Ignoring control message");
        return Ok(InboundMessage::Control);
    }

    Err(AppError::Decode(
        "Message is neither a detection array nor a control message".to_string(),
    ))
}

fn parse_detection_array(text: &str) -> DetectionFrame {
    let spans = split_json_objects(text);
    let mut detections = Vec::with_capacity(spans.len());

    for span in spans {
        match decode_detection(span) {
            Ok(detection) => detections.push(detection),
            // A bad object never aborts the batch
            Err(e) => warn!("Skipping undecodable detection object: {}", e),
        }
    }

    DetectionFrame { detections }
}

/// Split the top-level JSON objects of an array body
///
/// Balanced-brace counting over `{`/`}` only. Braces inside quoted
/// strings are not special-cased; class names containing a literal
/// brace would mis-split. That matches the wire format in practice and
/// is a documented limitation.
pub fn split_json_objects(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, b) in text.bytes().enumerate() {
        match b {
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    spans.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    spans
}

fn decode_detection(span: &str) -> Result<Detection> {
    let value: serde_json::Value = serde_json::from_str(span)?;

    // Key presence decides classification precedence, even for a null
    // value.
    let has_classification = value
        .as_object()
        .map_or(false, |obj| obj.contains_key("classification"));

    let wire: WireDetection = serde_json::from_value(value)?;
    Ok(wire.normalize(has_classification))
}
