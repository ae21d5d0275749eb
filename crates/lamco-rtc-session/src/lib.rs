//! # lamco-rtc-session
//!
//! Connection lifecycle for remote video sessions: signaling, transport
//! driving, keepalive and bounded reconnection.
//!
//! This crate is part of the [lamco-rtc](https://github.com/lamco-admin/lamco-rtc)
//! workspace. It owns a [`FrameConverter`](lamco_rtc_frame::FrameConverter)
//! from [`lamco-rtc-frame`](https://crates.io/crates/lamco-rtc-frame) and feeds
//! it the frames the media transport delivers.
//!
//! # Features
//!
//! - **Lifecycle State Machine**: `Disconnected`, `Connecting`, `Connected`,
//!   `Reconnecting` and `Error`, as a pure, I/O-free transition function
//! - **Bounded Reconnection**: Capped exponential backoff, terminal `Error`
//!   once the attempt budget is spent
//! - **Keepalive and Watchdog**: Periodic pings while connected; inbound
//!   silence forces a reconnect
//! - **Graceful Stop**: Best-effort bye, then teardown, with every timer and
//!   the resource sweep stopped before frames are released
//! - **Live Renegotiation**: Resolution, frame-rate and mode changes pushed as
//!   transport hints without reconnecting
//!
//! # Requirements
//!
//! The signaling channel and the media transport are external. Provide them by
//! implementing [`SignalingConnector`] and [`MediaTransport`].
//!
//! # State Machine
//!
//! ```text
//!                 start                     transport connected
//!  Disconnected ─────────> Connecting ───────(after negotiation)──────> Connected
//!       ▲                   ▲     │                                        │
//!       │                   │     │ lost / closed / timeout                │ lost / closed /
//!       │            retry  │     ▼                                        │ watchdog
//!       │            due    └─ Reconnecting <──────────────────────────────┘
//!       │                         │
//!       │ stop (any state)        │ attempts exhausted,
//!       └──────────────           ▼ negotiation failure
//!                               Error ── start ──> Connecting
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lamco_rtc_session::{
//!     AdaptationMode, MediaTransport, SessionConfig, SessionManager, SignalingConnector,
//! };
//!
//! # async fn example(
//! #     connector: Arc<dyn SignalingConnector>,
//! #     transport: Box<dyn MediaTransport>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::builder()
//!     .endpoint("ws://192.168.1.20:8080")
//!     .max_reconnect_attempts(3)
//!     .build();
//!
//! let manager = SessionManager::new(config, connector, transport)?;
//! manager.set_status_callback(Some(Arc::new(|event| println!("status: {event:?}"))));
//! manager.start().await?;
//!
//! // Renegotiated without a reconnect
//! manager.set_adaptation_mode(AdaptationMode::Performance).await?;
//!
//! manager.stop(true).await?;
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod backoff;
pub mod camera;
pub mod config;
pub mod error;
pub mod manager;
pub mod signaling;
pub mod state;
pub mod status;
pub mod transport;

// =============================================================================
// RE-EXPORTS - PRIMARY API
// =============================================================================

// Manager (primary entry point)
pub use manager::SessionManager;

// Configuration
pub use config::{BackoffConfig, SessionConfig, SessionConfigBuilder};

// Errors
pub use error::{Result, SessionError};

// State and status
pub use state::ConnectionState;
pub use status::{StatusCallback, StatusEvent};

// External seams
pub use signaling::{SignalingConnector, SignalingLink, SignalingMessage};
pub use transport::{MediaHints, MediaTransport, TransportObserver, TransportState};

// Camera adaptation
pub use camera::{CameraPosition, CameraProfile};

// Frame pipeline types that appear in this crate's API
pub use lamco_rtc_frame::{AdaptationMode, ConverterStats, DecodedFrame, PixelFormat, ProcessingMode};

// =============================================================================
// RE-EXPORTS - ADVANCED API
// =============================================================================

pub use backoff::Backoff;
pub use state::{Lifecycle, LifecycleEvent, SideEffect};

// =============================================================================
// CRATE-LEVEL ITEMS
// =============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_reexports() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert!(SessionConfig::default().validate().is_ok());
    }
}
