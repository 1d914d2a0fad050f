//! End-to-end latency fusion
//!
//! Combines the inference time reported inside a detection message with
//! the most recently sampled candidate-pair RTT. The two values come
//! from independent timelines; the pairing is best-effort, not an exact
//! per-round-trip correlation.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Field names probed on a single-object message, in priority order
const TIMING_KEYS: [&str; 5] = [
    "execution_time",
    "inference_time",
    "processing_time",
    "latency",
    "duration",
];

/// Fused end-to-end latency for one inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FusedLatency {
    /// Remote inference duration (ms)
    pub inference_ms: f64,
    /// Network round-trip time (ms)
    pub rtt_ms: f64,
    /// Sum of the two (ms)
    pub total_ms: f64,
}

/// Per-session latency fusion state
///
/// Holds only the inference-time component of the most recent message;
/// a message with no extractable timing resets it to zero so a stale
/// value is never fused with a fresh RTT.
pub struct LatencyFusionEngine {
    inference_ms: f64,
}

impl LatencyFusionEngine {
    pub fn new() -> Self {
        Self { inference_ms: 0.0 }
    }

    /// Update the inference component from one inbound message
    ///
    /// Returns the new component in milliseconds when the message
    /// carried a timing value; on a miss the component resets to zero
    /// and `None` is returned so the caller can skip fusion.
    pub fn observe_message(&mut self, raw: &[u8]) -> Option<f64> {
        match std::str::from_utf8(raw)
            .ok()
            .and_then(extract_inference_seconds)
        {
            Some(seconds) => {
                self.inference_ms = seconds * 1000.0;
                Some(self.inference_ms)
            }
            None => {
                debug!("No inference time in message, resetting component to 0");
                self.inference_ms = 0.0;
                None
            }
        }
    }

    /// Current inference component (ms)
    pub fn inference_ms(&self) -> f64 {
        self.inference_ms
    }

    /// Fuse the current inference component with an RTT sample
    pub fn fuse(&self, rtt_seconds: f64) -> FusedLatency {
        let rtt_ms = rtt_seconds * 1000.0;
        FusedLatency {
            inference_ms: self.inference_ms,
            rtt_ms,
            total_ms: self.inference_ms + rtt_ms,
        }
    }
}

impl Default for LatencyFusionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract an inference time in seconds from one message body
///
/// Tried in order: array of objects with `execution_time` (max wins),
/// bare numeric array (max wins), single object `execution_time`,
/// single object probed against the timing-field synonyms, the whole
/// body as a bare number.
pub fn extract_inference_seconds(text: &str) -> Option<f64> {
    let trimmed = text.trim();

    if trimmed.starts_with('[') {
        let items = match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Array(items)) => items,
            _ => return None,
        };

        let object_times: Vec<f64> = items
            .iter()
            .filter_map(|item| item.get("execution_time").and_then(numeric_seconds))
            .collect();
        if let Some(max) = object_times.into_iter().reduce(f64::max) {
            return Some(max);
        }

        let numbers: Vec<f64> = items.iter().filter_map(|item| item.as_f64()).collect();
        return numbers.into_iter().reduce(f64::max);
    }

    if trimmed.starts_with('{') {
        let value = serde_json::from_str::<Value>(trimmed).ok()?;
        for key in TIMING_KEYS {
            if let Some(seconds) = value.get(key).and_then(numeric_seconds) {
                return Some(seconds);
            }
        }
        return None;
    }

    trimmed.parse::<f64>().ok()
}

/// Numeric value or numeric string, as the wire format allows both
fn numeric_seconds(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_of_objects_takes_max() {
        let json = r#"[{"execution_time":0.012},{"execution_time":0.030}]"#;
        assert_eq!(extract_inference_seconds(json), Some(0.030));
    }

    #[test]
    fn test_array_of_objects_wins_over_numeric_reading() {
        // Also a syntactically plausible numeric array; the
        // object interpretation has priority
        let mut engine = LatencyFusionEngine::new();
        let ms =
            engine.observe_message(br#"[{"execution_time":0.012},{"execution_time":0.030}]"#);
        assert_eq!(ms, Some(30.0));
    }

    #[test]
    fn test_bare_numeric_array() {
        assert_eq!(extract_inference_seconds("[0.010, 0.025, 0.020]"), Some(0.025));
    }

    #[test]
    fn test_single_object_execution_time() {
        assert_eq!(
            extract_inference_seconds(r#"{"execution_time":0.042}"#),
            Some(0.042)
        );
    }

    #[test]
    fn test_synonym_priority_first_match_wins() {
        let json = r#"{"latency":0.5,"inference_time":0.1}"#;
        assert_eq!(extract_inference_seconds(json), Some(0.1));
    }

    #[test]
    fn test_numeric_string_value() {
        assert_eq!(
            extract_inference_seconds(r#"{"processing_time":"0.25"}"#),
            Some(0.25)
        );
    }

    #[test]
    fn test_bare_number_body() {
        assert_eq!(extract_inference_seconds("0.125"), Some(0.125));
    }

    #[test]
    fn test_no_timing_yields_none() {
        assert_eq!(extract_inference_seconds(r#"{"class_id":1}"#), None);
        assert_eq!(extract_inference_seconds("not a number"), None);
    }

    #[test]
    fn test_reset_on_miss() {
        let mut engine = LatencyFusionEngine::new();

        engine.observe_message(br#"{"execution_time":0.100}"#);
        assert_eq!(engine.inference_ms(), 100.0);

        // A message without timing resets to exactly 0, never reuses
        // the previous value
        assert_eq!(engine.observe_message(br#"{"class_id":1}"#), None);
        assert_eq!(engine.inference_ms(), 0.0);
    }

    #[test]
    fn test_fuse_sums_components() {
        let mut engine = LatencyFusionEngine::new();
        engine.observe_message(br#"{"execution_time":0.030}"#);

        let fused = engine.fuse(0.015);
        assert_eq!(fused.inference_ms, 30.0);
        assert_eq!(fused.rtt_ms, 15.0);
        assert_eq!(fused.total_ms, 45.0);
    }
}
