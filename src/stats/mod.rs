//! Candidate-pair RTT sampling
//!
//! Components that need connection-quality telemetry get a narrow
//! read/query-only capability ([`StatsSource`]) instead of the peer
//! connection itself; they can observe stats but never mutate or close
//! the connection.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::stats::StatsReportType;

/// Negotiation state of a candidate pair, as reported by the stats
/// snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    Succeeded,
    InProgress,
    Other,
}

impl PairState {
    /// Map the W3C state string of a stats entry
    pub fn from_wire(state: &str) -> Self {
        match state {
            "succeeded" => PairState::Succeeded,
            "in-progress" => PairState::InProgress,
            _ => PairState::Other,
        }
    }

    /// Whether this pair qualifies for RTT emission
    pub fn qualifies(self) -> bool {
        matches!(self, PairState::Succeeded | PairState::InProgress)
    }
}

/// One candidate-pair entry from a stats snapshot
#[derive(Debug, Clone)]
pub struct CandidatePairSnapshot {
    /// Stats entry identifier
    pub id: String,
    /// Pair negotiation state
    pub state: PairState,
    /// Current round-trip time (seconds)
    pub rtt_seconds: f64,
}

/// One emitted RTT sample
///
/// Transient: consumed to compute one fused-latency value and not
/// persisted.
#[derive(Debug, Clone)]
pub struct StatsSample {
    pub rtt_seconds: f64,
    pub stats_id: String,
}

/// Read-only stats capability
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Candidate-pair entries of one fresh stats snapshot
    async fn candidate_pairs(&self) -> Vec<CandidatePairSnapshot>;
}

/// Stats capability backed by a live peer connection
///
/// Holds the session manager's peer-connection slot, so the handle can
/// be created before negotiation; it reports an empty snapshot until
/// the connection exists.
pub struct PeerStatsHandle {
    pc: Arc<tokio::sync::RwLock<Option<Arc<RTCPeerConnection>>>>,
}

impl PeerStatsHandle {
    pub(crate) fn new(pc: Arc<tokio::sync::RwLock<Option<Arc<RTCPeerConnection>>>>) -> Self {
        Self { pc }
    }
}

#[async_trait]
impl StatsSource for PeerStatsHandle {
    async fn candidate_pairs(&self) -> Vec<CandidatePairSnapshot> {
        let pc = match self.pc.read().await.clone() {
            Some(pc) => pc,
            None => return Vec::new(),
        };

        let report = pc.get_stats().await;
        report
            .reports
            .into_iter()
            .filter_map(|(id, entry)| match entry {
                StatsReportType::CandidatePair(pair) => Some(CandidatePairSnapshot {
                    id,
                    state: PairState::from_wire(&pair.state.to_string()),
                    rtt_seconds: pair.current_round_trip_time,
                }),
                _ => None,
            })
            .collect()
    }
}

/// Extracts RTT samples from candidate-pair stats
pub struct StatsSampler {
    source: Arc<dyn StatsSource>,
}

impl StatsSampler {
    pub fn new(source: Arc<dyn StatsSource>) -> Self {
        Self { source }
    }

    /// Take one snapshot and emit a sample per qualifying pair
    ///
    /// Pairs in `succeeded` or `in-progress` each produce an
    /// independent sample; there is no dedup or aggregation. An empty
    /// result is non-fatal and logged as a warning.
    pub async fn sample(&self) -> Vec<StatsSample> {
        let pairs = self.source.candidate_pairs().await;

        let samples: Vec<StatsSample> = pairs
            .into_iter()
            .filter(|pair| pair.state.qualifies())
            .map(|pair| StatsSample {
                rtt_seconds: pair.rtt_seconds,
                stats_id: pair.id,
            })
            .collect();

        if samples.is_empty() {
            warn!("No qualifying candidate-pair statistics in snapshot");
        }

        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSource {
        pairs: Vec<CandidatePairSnapshot>,
    }

    #[async_trait]
    impl StatsSource for FakeSource {
        async fn candidate_pairs(&self) -> Vec<CandidatePairSnapshot> {
            self.pairs.clone()
        }
    }

    fn pair(id: &str, state: PairState, rtt: f64) -> CandidatePairSnapshot {
        CandidatePairSnapshot {
            id: id.to_string(),
            state,
            rtt_seconds: rtt,
        }
    }

    #[tokio::test]
    async fn test_only_qualifying_states_emit() {
        let sampler = StatsSampler::new(Arc::new(FakeSource {
            pairs: vec![
                pair("a", PairState::Succeeded, 0.010),
                pair("b", PairState::InProgress, 0.020),
                pair("c", PairState::Other, 0.030),
            ],
        }));

        let samples = sampler.sample().await;
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].stats_id, "a");
        assert_eq!(samples[1].stats_id, "b");
    }

    #[tokio::test]
    async fn test_empty_snapshot_is_nonfatal() {
        let sampler = StatsSampler::new(Arc::new(FakeSource { pairs: vec![] }));
        assert!(sampler.sample().await.is_empty());
    }

    #[tokio::test]
    async fn test_multiple_entries_no_dedup() {
        let sampler = StatsSampler::new(Arc::new(FakeSource {
            pairs: vec![
                pair("a", PairState::Succeeded, 0.010),
                pair("b", PairState::Succeeded, 0.010),
            ],
        }));
        assert_eq!(sampler.sample().await.len(), 2);
    }

    #[test]
    fn test_state_mapping() {
        assert_eq!(PairState::from_wire("succeeded"), PairState::Succeeded);
        assert_eq!(PairState::from_wire("in-progress"), PairState::InProgress);
        assert_eq!(PairState::from_wire("failed"), PairState::Other);
        assert_eq!(PairState::from_wire("waiting"), PairState::Other);
        assert!(!PairState::from_wire("failed").qualifies());
    }
}
