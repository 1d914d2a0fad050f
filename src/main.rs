use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sightlink::config::ClientConfig;
use sightlink::events::{EventBus, SessionEvent};
use sightlink::protocol::DetectionTracker;
use sightlink::session::{DetectionPipeline, PeerSessionManager};
use sightlink::signaling::SignalingTransport;
use sightlink::stats::StatsSampler;
use sightlink::video::TestPatternSource;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// Sightlink command line arguments
#[derive(Parser, Debug)]
#[command(name = "sightlink")]
#[command(version, about = "WebRTC live-inference streaming client", long_about = None)]
struct CliArgs {
    /// Path to a JSON configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Signaling offer endpoint (overrides config file)
    #[arg(long, value_name = "URL")]
    signaling_url: Option<String>,

    /// Signaling ICE candidate endpoint (overrides config file)
    #[arg(long, value_name = "URL")]
    ice_url: Option<String>,

    /// Accept self-signed TLS certificates on the signaling server
    #[arg(long)]
    insecure: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting sightlink v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path).await?;
            serde_json::from_str::<ClientConfig>(&raw)?
        }
        None => ClientConfig::default(),
    };
    if let Some(url) = args.signaling_url {
        config.signaling_url = url;
    }
    if let Some(url) = args.ice_url {
        config.signaling_ice_url = url;
    }
    if args.insecure {
        config.accept_invalid_certs = true;
    }
    tracing::info!("Signaling endpoint: {}", config.signaling_url);

    let bus = Arc::new(EventBus::new());
    let signaling = Arc::new(SignalingTransport::new(&config)?);
    let source = Arc::new(TestPatternSource::new(640, 480));

    let tracker_grace = config.overlay_grace();
    let max_boxes = config.max_boxes;
    let (manager, inbound_rx) =
        PeerSessionManager::new(config, signaling, source, bus.clone());
    let manager = Arc::new(manager);

    let pipeline = DetectionPipeline::new(
        bus.clone(),
        StatsSampler::new(Arc::new(manager.stats_handle())),
    );
    let pipeline_task = tokio::spawn(pipeline.run(inbound_rx));

    // Console consumer: keeps the overlay state and logs what a UI
    // would render.
    let mut events = bus.subscribe();
    let consumer_task = tokio::spawn(async move {
        let mut tracker = DetectionTracker::new(max_boxes, tracker_grace);
        loop {
            match events.recv().await {
                Ok(SessionEvent::Detections(frame)) => {
                    tracker.apply(&frame, Instant::now());
                    for detection in tracker.boxes() {
                        tracing::info!("Detection: {}", detection.label());
                    }
                }
                Ok(SessionEvent::DetectionError { message }) => {
                    tracker.clear();
                    tracing::warn!("Detection decode failed: {}", message);
                }
                Ok(SessionEvent::FusedLatency(fused)) => {
                    tracing::info!(
                        "Latency: inference {:.1} ms + rtt {:.1} ms = {:.1} ms",
                        fused.inference_ms,
                        fused.rtt_ms,
                        fused.total_ms
                    );
                }
                Ok(SessionEvent::StateChanged(state)) => {
                    tracing::info!("Session state changed: {}", state);
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event consumer lagged, skipped {} events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    manager.connect().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    manager.close().await;
    pipeline_task.abort();
    consumer_task.abort();

    Ok(())
}

fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "sightlink=error,webrtc=error",
        LogLevel::Warn => "sightlink=warn,webrtc=error",
        LogLevel::Info => "sightlink=info,webrtc=error",
        LogLevel::Debug => "sightlink=debug,webrtc=warn",
        LogLevel::Trace => "sightlink=trace,webrtc=info",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
