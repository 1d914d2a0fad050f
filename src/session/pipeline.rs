//! Inbound detection pipeline
//!
//! Consumes raw data-channel messages, decodes them into detection
//! frames, and drives latency fusion. Each message fans out on the
//! event bus: the raw bytes first, then the decoded result, then one
//! RTT/fused-latency pair per qualifying candidate pair.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::events::{EventBus, SessionEvent};
use crate::latency::LatencyFusionEngine;
use crate::protocol::parser::{parse_message, InboundMessage};
use crate::stats::StatsSampler;

pub struct DetectionPipeline {
    bus: Arc<EventBus>,
    fusion: LatencyFusionEngine,
    sampler: StatsSampler,
}

impl DetectionPipeline {
    pub fn new(bus: Arc<EventBus>, sampler: StatsSampler) -> Self {
        Self {
            bus,
            fusion: LatencyFusionEngine::new(),
            sampler,
        }
    }

    /// Consume inbound messages until the channel closes
    pub async fn run(mut self, mut inbound: mpsc::Receiver<Bytes>) {
        while let Some(raw) = inbound.recv().await {
            self.handle_message(raw).await;
        }
        debug!("Inbound channel closed, detection pipeline stopping");
    }

    async fn handle_message(&mut self, raw: Bytes) {
        self.bus.publish(SessionEvent::InferenceResult(raw.clone()));

        match parse_message(&raw) {
            Ok(InboundMessage::Detections(frame)) => {
                debug!("Decoded {} detections", frame.detections.len());
                self.bus.publish(SessionEvent::Detections(frame));
            }
            Ok(InboundMessage::Control) => {
                debug!("Ignoring control message");
            }
            Err(e) => {
                warn!("Failed to decode inbound message: {}", e);
                self.bus.publish(SessionEvent::DetectionError {
                    message: e.to_string(),
                });
            }
        }

        // Fusion only runs on messages that carry a timing value; a
        // miss still resets the inference component to zero.
        if self.fusion.observe_message(&raw).is_none() {
            return;
        }

        for sample in self.sampler.sample().await {
            self.bus.publish(SessionEvent::RttSample {
                rtt_seconds: sample.rtt_seconds,
                stats_id: sample.stats_id.clone(),
            });
            self.bus
                .publish(SessionEvent::FusedLatency(self.fusion.fuse(sample.rtt_seconds)));
        }
    }
}
