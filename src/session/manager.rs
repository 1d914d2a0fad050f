//! Peer session manager
//!
//! One instance per streaming session. Drives the offering side of the
//! negotiation: waits for local media, builds the peer connection,
//! creates the detection data channel, exchanges SDP over the signaling
//! transport and trickles ICE candidates as they are discovered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use crate::config::ClientConfig;
use crate::error::{AppError, Result};
use crate::events::{EventBus, SessionEvent};
use crate::session::track::OutboundVideoTrack;
use crate::session::{answer_includes_video, SessionState};
use crate::signaling::{IceCandidateExchange, SignalingTransport};
use crate::stats::PeerStatsHandle;
use crate::video::VideoSource;

/// How often the media-readiness wait polls the source
const MEDIA_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Capacity of the inbound data-channel message queue
const INBOUND_QUEUE_SIZE: usize = 64;

pub struct PeerSessionManager {
    config: ClientConfig,
    signaling: Arc<SignalingTransport>,
    source: Arc<dyn VideoSource>,
    bus: Arc<EventBus>,
    state_tx: Arc<watch::Sender<SessionState>>,
    state_rx: watch::Receiver<SessionState>,
    pc: Arc<RwLock<Option<Arc<RTCPeerConnection>>>>,
    data_channel: Arc<RwLock<Option<Arc<RTCDataChannel>>>>,
    pending_candidates: Arc<Mutex<Vec<IceCandidateExchange>>>,
    local_description_set: Arc<AtomicBool>,
    copy_task: Mutex<Option<JoinHandle<()>>>,
    inbound_tx: mpsc::Sender<Bytes>,
}

impl PeerSessionManager {
    /// Build a manager plus the receiving end of the inbound message
    /// queue, which the detection pipeline consumes.
    pub fn new(
        config: ClientConfig,
        signaling: Arc<SignalingTransport>,
        source: Arc<dyn VideoSource>,
        bus: Arc<EventBus>,
    ) -> (Self, mpsc::Receiver<Bytes>) {
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_SIZE);
        let manager = Self {
            config,
            signaling,
            source,
            bus,
            state_tx: Arc::new(state_tx),
            state_rx,
            pc: Arc::new(RwLock::new(None)),
            data_channel: Arc::new(RwLock::new(None)),
            pending_candidates: Arc::new(Mutex::new(Vec::new())),
            local_description_set: Arc::new(AtomicBool::new(false)),
            copy_task: Mutex::new(None),
            inbound_tx,
        };
        (manager, inbound_rx)
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Watch channel for state transitions
    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Stats capability over whichever peer connection is live
    pub fn stats_handle(&self) -> PeerStatsHandle {
        PeerStatsHandle::new(self.pc.clone())
    }

    fn set_state(&self, next: SessionState) {
        if *self.state_rx.borrow() == next {
            return;
        }
        info!("Session state: {} -> {}", *self.state_rx.borrow(), next);
        let _ = self.state_tx.send(next);
        self.bus.publish(SessionEvent::StateChanged(next));
    }

    /// Run one full negotiation attempt
    ///
    /// On success the session is `Connected`; any failure leaves the
    /// state short of `Connected` and returns the error unchanged.
    pub async fn connect(&self) -> Result<()> {
        self.set_state(SessionState::AwaitingLocalMedia);
        self.wait_for_media().await?;

        self.set_state(SessionState::NegotiatingOffer);
        let pc = self.build_peer_connection().await?;
        self.install_callbacks(&pc);
        *self.pc.write().await = Some(pc.clone());

        let track = Arc::new(OutboundVideoTrack::new("video", "sightlink-stream"));
        pc.add_track(track.rtp_track()).await?;
        self.start_copy_loop(track);

        let init = RTCDataChannelInit {
            ordered: Some(true),
            protocol: Some(self.config.data_channel_protocol.clone()),
            ..Default::default()
        };
        let dc = pc
            .create_data_channel(&self.config.data_channel_label, Some(init))
            .await?;
        attach_inbound_handler(&dc, self.inbound_tx.clone());
        *self.data_channel.write().await = Some(dc);

        let offer = pc.create_offer(None).await?;
        pc.set_local_description(offer).await?;
        self.local_description_set.store(true, Ordering::SeqCst);
        self.flush_pending_candidates();

        let local = pc.local_description().await.ok_or_else(|| {
            AppError::Internal("local description missing after set".to_string())
        })?;

        self.set_state(SessionState::AwaitingAnswer);
        let answer = self.signaling.exchange_offer(&local.sdp).await?;
        if !answer_includes_video(&answer.sdp) {
            error!("Answer rejected: no video media section");
            return Err(AppError::InvalidAnswer(
                "answer has no video media section".to_string(),
            ));
        }

        let desc = RTCSessionDescription::answer(answer.sdp)?;
        pc.set_remote_description(desc).await?;

        self.set_state(SessionState::Connected);
        info!("Session connected");
        Ok(())
    }

    /// Send one encoded frame over the detection channel
    ///
    /// Returns whether it was handed to the transport. While the
    /// channel is not open the frame is dropped with a warning, never
    /// queued for later.
    pub async fn send_frame(&self, data: Bytes) -> bool {
        let guard = self.data_channel.read().await;
        match guard.as_ref() {
            Some(dc) if dc.ready_state() == RTCDataChannelState::Open => {
                match dc.send(&data).await {
                    Ok(n) => {
                        debug!("Sent frame, {} bytes", n);
                        true
                    }
                    Err(e) => {
                        warn!("Failed to send frame: {}", e);
                        false
                    }
                }
            }
            Some(dc) => {
                warn!(
                    "Data channel not open ({:?}), dropping frame",
                    dc.ready_state()
                );
                false
            }
            None => {
                warn!("Data channel not created yet, dropping frame");
                false
            }
        }
    }

    /// Tear the session down
    ///
    /// Idempotent and safe from any state; whatever pieces exist are
    /// released (copy task, then data channel, then peer connection)
    /// and close errors are logged, never surfaced.
    pub async fn close(&self) {
        if let Some(handle) = self.copy_task.lock().take() {
            handle.abort();
        }
        if let Some(dc) = self.data_channel.write().await.take() {
            if let Err(e) = dc.close().await {
                debug!("Data channel close: {}", e);
            }
        }
        if let Some(pc) = self.pc.write().await.take() {
            if let Err(e) = pc.close().await {
                debug!("Peer connection close: {}", e);
            }
        }
        self.pending_candidates.lock().clear();
        self.local_description_set.store(false, Ordering::SeqCst);
        self.set_state(SessionState::Closed);
        info!("Session closed");
    }

    /// Poll the video source until it reports a usable frame size
    async fn wait_for_media(&self) -> Result<()> {
        let timeout = self.config.media_timeout();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.source.is_ready() {
                if let Some((w, h)) = self.source.frame_size() {
                    info!("Video source ready: {}x{}", w, h);
                }
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                error!(
                    "Timed out waiting for video source after {:?}",
                    timeout
                );
                return Err(AppError::MediaTimeout(timeout));
            }
            tokio::time::sleep(MEDIA_POLL_INTERVAL).await;
        }
    }

    async fn build_peer_connection(&self) -> Result<Arc<RTCPeerConnection>> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = if self.config.stun_servers.is_empty() {
            Vec::new()
        } else {
            vec![RTCIceServer {
                urls: self.config.stun_servers.clone(),
                ..Default::default()
            }]
        };
        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await?);
        Ok(pc)
    }

    fn install_callbacks(&self, pc: &Arc<RTCPeerConnection>) {
        let signaling = self.signaling.clone();
        let pending = self.pending_candidates.clone();
        let local_ready = self.local_description_set.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let signaling = signaling.clone();
            let pending = pending.clone();
            let local_ready = local_ready.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    debug!("ICE candidate gathering complete");
                    return;
                };
                let init = match candidate.to_json() {
                    Ok(init) => init,
                    Err(e) => {
                        warn!("Failed to serialize ICE candidate: {}", e);
                        return;
                    }
                };
                let exchange = IceCandidateExchange {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid.unwrap_or_default(),
                    sdp_mline_index: init.sdp_mline_index.unwrap_or(0),
                };
                // Candidates discovered before the offer becomes the
                // local description are held back and flushed after.
                if !local_ready.load(Ordering::SeqCst) {
                    debug!("Buffering ICE candidate until local description is set");
                    pending.lock().push(exchange);
                    return;
                }
                push_candidate(signaling, exchange).await;
            })
        }));

        let state_rx = self.state_rx.clone();
        let state_tx = self.state_tx.clone();
        let bus = self.bus.clone();
        pc.on_ice_connection_state_change(Box::new(move |ice_state: RTCIceConnectionState| {
            info!("ICE connection state: {}", ice_state);
            if ice_state == RTCIceConnectionState::Disconnected
                && *state_rx.borrow() == SessionState::Connected
            {
                let _ = state_tx.send(SessionState::Disconnected);
                bus.publish(SessionEvent::StateChanged(SessionState::Disconnected));
            }
            Box::pin(async {})
        }));

        // The server may open its own channel towards us; wire it into
        // the same inbound queue as the locally created one.
        let inbound_tx = self.inbound_tx.clone();
        pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let inbound_tx = inbound_tx.clone();
            Box::pin(async move {
                info!("Remote data channel announced: '{}'", dc.label());
                attach_inbound_handler(&dc, inbound_tx);
            })
        }));
    }

    fn flush_pending_candidates(&self) {
        let drained: Vec<IceCandidateExchange> =
            self.pending_candidates.lock().drain(..).collect();
        if drained.is_empty() {
            return;
        }
        debug!("Flushing {} buffered ICE candidates", drained.len());
        for exchange in drained {
            let signaling = self.signaling.clone();
            tokio::spawn(async move {
                push_candidate(signaling, exchange).await;
            });
        }
    }

    /// Copy fresh frames from the source onto the outbound track
    fn start_copy_loop(&self, track: Arc<OutboundVideoTrack>) {
        let source = self.source.clone();
        let interval = self.config.frame_interval();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_sequence = 0u64;
            loop {
                ticker.tick().await;
                let Some(frame) = source.latest_frame() else {
                    continue;
                };
                if frame.sequence == last_sequence {
                    continue;
                }
                last_sequence = frame.sequence;
                if let Err(e) = track.write_frame(&frame).await {
                    debug!("Dropping frame {}: {}", frame.sequence, e);
                }
            }
        });
        if let Some(previous) = self.copy_task.lock().replace(handle) {
            previous.abort();
        }
    }
}

/// Fire-and-forget trickle push; a failed candidate is logged and lost
async fn push_candidate(signaling: Arc<SignalingTransport>, exchange: IceCandidateExchange) {
    match signaling.push_candidate(&exchange).await {
        Ok(()) => debug!("Pushed ICE candidate (mid '{}')", exchange.sdp_mid),
        Err(e) => warn!("Failed to push ICE candidate: {}", e),
    }
}

fn attach_inbound_handler(dc: &Arc<RTCDataChannel>, inbound_tx: mpsc::Sender<Bytes>) {
    let label = dc.label().to_string();
    dc.on_open(Box::new({
        let label = label.clone();
        move || {
            info!("Data channel '{}' open", label);
            Box::pin(async {})
        }
    }));

    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let inbound_tx = inbound_tx.clone();
        Box::pin(async move {
            debug!("Data channel message: {} bytes", msg.data.len());
            if inbound_tx.try_send(msg.data).is_err() {
                warn!("Inbound queue full or closed, dropping message");
            }
        })
    }));

    dc.on_close(Box::new(move || {
        info!("Data channel '{}' closed", label);
        Box::pin(async {})
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::test_pattern::TestPatternSource;

    fn test_config() -> ClientConfig {
        let mut config = ClientConfig::default();
        config.signaling_url = "http://127.0.0.1:9/offer".to_string();
        config.signaling_ice_url = "http://127.0.0.1:9/candidate".to_string();
        // Keep negotiation tests off the network
        config.stun_servers.clear();
        config
    }

    fn build_manager(source: Arc<dyn VideoSource>) -> (PeerSessionManager, mpsc::Receiver<Bytes>) {
        let config = test_config();
        let signaling = Arc::new(SignalingTransport::new(&config).unwrap());
        PeerSessionManager::new(config, signaling, source, Arc::new(EventBus::new()))
    }

    struct NeverReadySource;

    impl VideoSource for NeverReadySource {
        fn frame_size(&self) -> Option<(u32, u32)> {
            None
        }
        fn latest_frame(&self) -> Option<crate::video::VideoFrame> {
            None
        }
    }

    #[tokio::test]
    async fn test_media_timeout_when_source_never_ready() {
        let (manager, _rx) = {
            let mut config = test_config();
            config.media_timeout_ms = 50;
            let signaling = Arc::new(SignalingTransport::new(&config).unwrap());
            PeerSessionManager::new(
                config,
                signaling,
                Arc::new(NeverReadySource),
                Arc::new(EventBus::new()),
            )
        };

        let result = manager.connect().await;
        assert!(matches!(result, Err(AppError::MediaTimeout(_))));
        assert_eq!(manager.state(), SessionState::AwaitingLocalMedia);
    }

    #[tokio::test]
    async fn test_send_frame_without_channel_drops() {
        let source = Arc::new(TestPatternSource::new(320, 240));
        let (manager, _rx) = build_manager(source);

        assert!(!manager.send_frame(Bytes::from_static(b"frame")).await);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_from_any_state() {
        let source = Arc::new(TestPatternSource::new(320, 240));
        let (manager, _rx) = build_manager(source);

        // Never connected; close twice must still succeed silently
        manager.close().await;
        assert_eq!(manager.state(), SessionState::Closed);
        manager.close().await;
        assert_eq!(manager.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_state_watch_observes_transitions() {
        let source = Arc::new(TestPatternSource::new(320, 240));
        let (manager, _rx) = build_manager(source);
        let watch = manager.state_watch();

        assert_eq!(*watch.borrow(), SessionState::Idle);
        manager.set_state(SessionState::AwaitingLocalMedia);
        assert_eq!(*watch.borrow(), SessionState::AwaitingLocalMedia);
    }
}
