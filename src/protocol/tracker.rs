//! Presentation-side detection state
//!
//! Enforces the replace-don't-merge contract for overlay consumers and
//! the auto-hide grace period for stale boxes.

use std::time::{Duration, Instant};

use super::{Detection, DetectionFrame};

/// Tracks the currently displayed detection set
///
/// Each applied frame fully replaces the previous one. When frames stop
/// carrying detections the current boxes survive for a grace period and
/// are then cleared, so a short detection gap does not flicker the
/// overlay.
pub struct DetectionTracker {
    boxes: Vec<Detection>,
    max_boxes: usize,
    grace: Duration,
    last_detection: Option<Instant>,
}

impl DetectionTracker {
    pub fn new(max_boxes: usize, grace: Duration) -> Self {
        Self {
            boxes: Vec::new(),
            max_boxes,
            grace,
            last_detection: None,
        }
    }

    /// Apply one decoded frame, replacing the displayed set
    ///
    /// An empty frame keeps the previous boxes on screen until the
    /// grace period elapses.
    pub fn apply(&mut self, frame: &DetectionFrame, now: Instant) {
        if frame.is_empty() {
            self.expire(now);
            return;
        }

        self.last_detection = Some(now);
        self.boxes.clear();
        self.boxes
            .extend(frame.detections.iter().take(self.max_boxes).cloned());
    }

    /// Clear immediately, e.g. on a decode error event
    pub fn clear(&mut self) {
        self.boxes.clear();
        self.last_detection = None;
    }

    /// Drop stale boxes once the grace period has elapsed
    pub fn expire(&mut self, now: Instant) {
        if let Some(last) = self.last_detection {
            if now.duration_since(last) >= self.grace {
                self.clear();
            }
        }
    }

    /// Currently displayed boxes, capped at `max_boxes`
    pub fn boxes(&self) -> &[Detection] {
        &self.boxes
    }
}
