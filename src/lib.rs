//! # lamco-rtc
//!
//! Remote video stream ingestion for Rust: frame conversion, buffer lifetime
//! tracking and connection lifecycle.
//!
//! This crate provides a unified interface to the lamco-rtc libraries:
//!
//! - **[`frame`]** - Pixel format detection, conversion, scaling, rate gating
//!   and a leak-audited frame cache
//! - **[`session`]** - Connection lifecycle: signaling, keepalive and bounded
//!   reconnection around an external media transport
//!
//! # Features
//!
//! All features are enabled by default. You can selectively enable only what you need:
//!
//! ```toml
//! # Use everything (default)
//! lamco-rtc = "0.1"
//!
//! # Frame pipeline only
//! lamco-rtc = { version = "0.1", default-features = false, features = ["frame"] }
//! ```
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `frame` | Yes | Frame ingestion and conversion |
//! | `session` | Yes | Connection lifecycle (implies `frame`) |
//! | `full` | No | All features from all sub-crates |
//!
//! # Quick Start
//!
//! ## Frame Pipeline
//!
//! ```rust,ignore
//! use lamco_rtc::frame::{ConverterConfig, FrameConverter, PixelFormat, TransportFrame, FOURCC_420V};
//!
//! let converter = FrameConverter::new(ConverterConfig::builder().target_fps(30).build())?;
//!
//! // From the transport's renderer callback
//! converter.on_frame(TransportFrame::new(FOURCC_420V, width, height, data, pts));
//!
//! // From the consumer
//! let frame = converter.latest_frame(Some(PixelFormat::PackedBgra))?;
//! ```
//!
//! ## Full Session
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lamco_rtc::session::{ConnectionState, SessionConfig, SessionManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::builder().endpoint("ws://192.168.1.20:8080").build();
//!
//!     // Connector and transport wrap your signaling client and peer connection
//!     let manager = SessionManager::new(config, Arc::new(connector), Box::new(transport))?;
//!     manager.start().await?;
//!
//!     let frame = manager.latest_frame(None)?;
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           lamco-rtc                             │
//! ├────────────────────────────────┬────────────────────────────────┤
//! │       lamco-rtc-session        │        lamco-rtc-frame         │
//! │                                │                                │
//! │  SessionManager ──owns───────────> FrameConverter               │
//! │  Lifecycle / Backoff           │  FrameCache / RateGate         │
//! │  SignalingMessage              │  ScopedBufferLock              │
//! │  SessionConfig                 │  ResourceMonitor               │
//! └────────┬──────────────┬────────┴────────────────────────────────┘
//!          │              │
//!          ▼              ▼
//!   Signaling channel   Media transport (frames + ICE state)
//! ```
//!
//! # Related Crates
//!
//! You can also use the individual crates directly:
//!
//! - [`lamco-rtc-frame`](https://crates.io/crates/lamco-rtc-frame) - Frame pipeline only
//! - [`lamco-rtc-session`](https://crates.io/crates/lamco-rtc-session) - Session lifecycle

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// RE-EXPORTS
// =============================================================================

/// Frame ingestion and conversion.
///
/// This module provides the frame pipeline:
/// - Pixel format detection and YUV/BGRA conversion
/// - Aspect-preserving scaling and rate gating
/// - Scoped buffer locks and leak accounting
/// - Bounded frame cache with background expiry
///
/// See [`lamco_rtc_frame`] documentation for details.
#[cfg(feature = "frame")]
#[cfg_attr(docsrs, doc(cfg(feature = "frame")))]
pub use lamco_rtc_frame as frame;

/// Connection lifecycle for remote video sessions.
///
/// This module drives the session:
/// - Connection state machine with bounded reconnection
/// - Signaling messages, keepalive and watchdog
/// - Live renegotiation of resolution and frame rate
///
/// See [`lamco_rtc_session`] documentation for details.
#[cfg(feature = "session")]
#[cfg_attr(docsrs, doc(cfg(feature = "session")))]
pub use lamco_rtc_session as session;

// =============================================================================
// PRELUDE - Common types for convenience
// =============================================================================

/// Prelude module with commonly used types.
///
/// ```rust
/// use lamco_rtc::prelude::*;
/// ```
pub mod prelude {
    #[cfg(feature = "frame")]
    pub use lamco_rtc_frame::{
        AdaptationMode, ConverterConfig, DecodedFrame, FrameConverter, FrameError, PixelFormat, TransportFrame,
    };

    #[cfg(feature = "session")]
    pub use lamco_rtc_session::{ConnectionState, SessionConfig, SessionError, SessionManager, StatusEvent};
}
