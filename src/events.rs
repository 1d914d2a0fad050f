//! Event system for session and telemetry notifications
//!
//! A broadcast bus distributes session events to the presentation layer
//! and any other subscriber. Events are fire-and-forget: with no active
//! subscriber they are silently dropped, and a subscriber that falls too
//! far behind misses events rather than blocking the session.

use bytes::Bytes;
use tokio::sync::broadcast;

use crate::latency::FusedLatency;
use crate::protocol::DetectionFrame;
use crate::session::SessionState;

/// Event channel capacity (ring buffer size)
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events published over the session event bus
///
/// Delivery order is arrival order; there is exactly one publisher side
/// per session, so subscribers observe events in the order the session
/// produced them.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session state machine moved to a new state
    StateChanged(SessionState),
    /// Raw bytes of one inbound detection-channel message
    InferenceResult(Bytes),
    /// Decoded detections of one inbound message, in wire order
    Detections(DetectionFrame),
    /// An inbound message could not be decoded; consumers should clear
    /// any stale overlay
    DetectionError { message: String },
    /// RTT extracted from one qualifying candidate-pair stats entry
    RttSample { rtt_seconds: f64, stats_id: String },
    /// Fused end-to-end latency for one inbound frame
    FusedLatency(FusedLatency),
}

/// Broadcast bus for [`SessionEvent`]s
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all subscribers
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: SessionEvent) {
        // If no subscribers, send returns Err which is normal
        let _ = self.tx.send(event);
    }

    /// Subscribe to events
    ///
    /// Returns a receiver that will receive all future events. Dropping
    /// the receiver is the unsubscribe; no explicit teardown is needed.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(SessionEvent::StateChanged(SessionState::Connected));

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            SessionEvent::StateChanged(SessionState::Connected)
        ));
    }

    #[tokio::test]
    async fn test_arrival_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(SessionEvent::RttSample {
            rtt_seconds: 0.010,
            stats_id: "pair-1".to_string(),
        });
        bus.publish(SessionEvent::RttSample {
            rtt_seconds: 0.020,
            stats_id: "pair-2".to_string(),
        });

        match rx.recv().await.unwrap() {
            SessionEvent::RttSample { stats_id, .. } => assert_eq!(stats_id, "pair-1"),
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            SessionEvent::RttSample { stats_id, .. } => assert_eq!(stats_id, "pair-2"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish(SessionEvent::DetectionError {
            message: "bad frame".to_string(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
