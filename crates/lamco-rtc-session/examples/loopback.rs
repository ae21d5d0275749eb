//! Drive a session against an in-process peer
//!
//! The peer answers on an in-memory signaling channel and the transport
//! synthesizes a 60 fps 420f camera. Halfway through, the adaptation mode
//! changes and the new hints are pushed without reconnecting.
//!
//! Run with: `cargo run -p lamco-rtc-session --example loopback`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lamco_rtc_frame::{PixelFormat, TransportFrame, FOURCC_420F};
use lamco_rtc_session::{
    AdaptationMode, ConnectionState, MediaHints, MediaTransport, SessionConfig, SessionManager, SignalingConnector,
    SignalingLink, SignalingMessage, StatusEvent, TransportObserver, TransportState,
};
use tokio::task::JoinHandle;

/// Spawns a peer task on the far end of every connection
struct LoopbackConnector;

#[async_trait]
impl SignalingConnector for LoopbackConnector {
    async fn connect(&self, endpoint: &str) -> lamco_rtc_session::Result<SignalingLink> {
        println!("connecting to {endpoint}");
        let (local, remote) = SignalingLink::pair(32);
        tokio::spawn(run_peer(remote));
        Ok(local)
    }
}

async fn run_peer(mut link: SignalingLink) {
    while let Some(Ok(message)) = link.recv().await {
        let reply = match message {
            SignalingMessage::Hello { client, compatibility } => {
                println!("peer: hello from {client} (compatibility: {compatibility})");
                Some(SignalingMessage::Offer {
                    sdp: "v=0 loopback".to_string(),
                })
            }
            SignalingMessage::Ping => Some(SignalingMessage::Pong),
            SignalingMessage::Bye => {
                println!("peer: bye");
                None
            }
            _ => None,
        };
        if let Some(reply) = reply {
            if link.send(&reply).await.is_err() {
                break;
            }
        }
    }
}

/// Synthetic camera behind the transport seam
#[derive(Default)]
struct LoopbackTransport {
    observer: Option<Arc<dyn TransportObserver>>,
    hints: Option<MediaHints>,
    camera: Option<JoinHandle<()>>,
}

#[async_trait]
impl MediaTransport for LoopbackTransport {
    async fn open(&mut self, observer: Arc<dyn TransportObserver>, hints: MediaHints) -> lamco_rtc_session::Result<()> {
        observer.on_state_change(TransportState::New);
        self.observer = Some(observer);
        self.hints = Some(hints);
        Ok(())
    }

    async fn handle_remote_signal(&mut self, message: &SignalingMessage) -> lamco_rtc_session::Result<()> {
        let (SignalingMessage::Offer { .. }, Some(observer)) = (message, &self.observer) else {
            return Ok(());
        };

        observer.on_signaling_message(SignalingMessage::Answer {
            sdp: "v=0 answer".to_string(),
        });
        observer.on_state_change(TransportState::Checking);

        let observer = Arc::clone(observer);
        self.camera = Some(tokio::spawn(async move {
            observer.on_state_change(TransportState::Connected);
            let (width, height) = (1280, 720);
            let size = PixelFormat::FullRangeYuv420.buffer_size(width, height).unwrap_or(0);
            let mut ticker = tokio::time::interval(Duration::from_micros(16_667));
            for i in 0u64.. {
                ticker.tick().await;
                let pts = Duration::from_micros(i * 16_667);
                observer.on_frame(TransportFrame::new(FOURCC_420F, width, height, vec![(i % 256) as u8; size], pts));
            }
        }));
        Ok(())
    }

    async fn set_constraints(&mut self, hints: MediaHints) -> lamco_rtc_session::Result<()> {
        println!("transport: renegotiated to {}x{}@{}", hints.width, hints.height, hints.fps);
        self.hints = Some(hints);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(camera) = self.camera.take() {
            camera.abort();
        }
        self.observer = None;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = SessionConfig::builder()
        .endpoint("loopback://camera")
        .keepalive_interval(Duration::from_secs(1))
        .watchdog_window(Duration::from_secs(3))
        .build();

    let manager = SessionManager::new(config, Arc::new(LoopbackConnector), Box::new(LoopbackTransport::default()))?;
    manager.set_status_callback(Some(Arc::new(|event: &StatusEvent| {
        if !matches!(event, StatusEvent::ProcessingModeChanged(_)) {
            println!("status: {event:?}");
        }
    })));

    manager.start().await?;
    manager
        .wait_for_state(ConnectionState::Connected, Duration::from_secs(5))
        .await?;

    tokio::time::sleep(Duration::from_secs(2)).await;
    manager.set_adaptation_mode(AdaptationMode::Performance).await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let frame = manager.latest_frame(None)?;
    let stats = manager.stats();
    println!(
        "latest #{} {} {}x{}; frames={} processed={} dropped={} fps={:.1}",
        frame.sequence(),
        frame.format(),
        frame.dimensions().0,
        frame.dimensions().1,
        stats.frame_count,
        stats.processed_count,
        stats.dropped_frame_count,
        stats.estimated_fps
    );

    manager.stop(true).await?;
    manager.shutdown().await;
    Ok(())
}
