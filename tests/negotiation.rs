//! Negotiation tests against a mock signaling server
//!
//! The mock answers offers with a real answering peer so the client
//! walks the whole state machine; no media or ICE connectivity is
//! required, only the SDP exchange.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use sightlink::config::ClientConfig;
use sightlink::events::EventBus;
use sightlink::session::{PeerSessionManager, SessionState};
use sightlink::signaling::{SdpExchange, SignalingTransport};
use sightlink::video::TestPatternSource;
use sightlink::AppError;

async fn spawn_signaling(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock signaling");
    let addr = listener.local_addr().expect("mock signaling addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock signaling serve");
    });
    addr
}

fn test_config(addr: SocketAddr) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.signaling_url = format!("http://{addr}/offer");
    config.signaling_ice_url = format!("http://{addr}/candidate");
    // Host candidates are enough here; stay off the network
    config.stun_servers.clear();
    config
}

fn build_manager(
    config: ClientConfig,
) -> (PeerSessionManager, tokio::sync::mpsc::Receiver<bytes::Bytes>) {
    let signaling = Arc::new(SignalingTransport::new(&config).expect("signaling transport"));
    let source = Arc::new(TestPatternSource::new(320, 240));
    PeerSessionManager::new(config, signaling, source, Arc::new(EventBus::new()))
}

/// Produce a real SDP answer for the given offer
async fn answer_offer(offer_sdp: String) -> Result<String, webrtc::Error> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;
    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let pc = api.new_peer_connection(RTCConfiguration::default()).await?;
    pc.set_remote_description(RTCSessionDescription::offer(offer_sdp)?)
        .await?;
    let answer = pc.create_answer(None).await?;
    let sdp = answer.sdp.clone();
    pc.close().await?;
    Ok(sdp)
}

async fn offer_handler(Json(exchange): Json<SdpExchange>) -> Json<SdpExchange> {
    assert_eq!(exchange.kind, "offer");
    let sdp = answer_offer(exchange.sdp)
        .await
        .expect("answering peer failed");
    Json(SdpExchange {
        sdp,
        kind: "answer".to_string(),
    })
}

async fn candidate_handler(Json(_): Json<serde_json::Value>) -> StatusCode {
    StatusCode::OK
}

/// Answer that carries only a data channel section
async fn data_only_offer_handler(Json(_): Json<SdpExchange>) -> Json<SdpExchange> {
    Json(SdpExchange {
        sdp: "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n"
            .to_string(),
        kind: "answer".to_string(),
    })
}

#[tokio::test]
async fn negotiation_reaches_connected() {
    let app = Router::new()
        .route("/offer", post(offer_handler))
        .route("/candidate", post(candidate_handler));
    let addr = spawn_signaling(app).await;

    let (manager, _inbound) = build_manager(test_config(addr));

    tokio::time::timeout(Duration::from_secs(10), manager.connect())
        .await
        .expect("negotiation timed out")
        .expect("connect failed");

    assert!(manager.is_connected());
    assert_eq!(manager.state(), SessionState::Connected);

    manager.close().await;
    assert_eq!(manager.state(), SessionState::Closed);
}

#[tokio::test]
async fn answer_without_video_is_rejected() {
    let app = Router::new()
        .route("/offer", post(data_only_offer_handler))
        .route("/candidate", post(candidate_handler));
    let addr = spawn_signaling(app).await;

    let (manager, _inbound) = build_manager(test_config(addr));

    let result = tokio::time::timeout(Duration::from_secs(10), manager.connect())
        .await
        .expect("negotiation timed out");

    assert!(matches!(result, Err(AppError::InvalidAnswer(_))));
    assert_ne!(manager.state(), SessionState::Connected);

    // Teardown after a failed negotiation is still clean
    manager.close().await;
    assert_eq!(manager.state(), SessionState::Closed);
}

#[tokio::test]
async fn signaling_error_surfaces_without_connecting() {
    // Nothing is listening on this address
    let mut config = ClientConfig::default();
    config.signaling_url = "http://127.0.0.1:9/offer".to_string();
    config.signaling_ice_url = "http://127.0.0.1:9/candidate".to_string();
    config.stun_servers.clear();

    let (manager, _inbound) = build_manager(config);

    let result = tokio::time::timeout(Duration::from_secs(10), manager.connect())
        .await
        .expect("negotiation timed out");

    assert!(result.is_err());
    assert_ne!(manager.state(), SessionState::Connected);
}
