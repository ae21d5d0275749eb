//! # lamco-rtc-frame
//!
//! Decoded frame ingestion for remote video streams: pixel format detection,
//! hardware/software color conversion, scaling, rate gating and a bounded,
//! leak-audited frame cache.
//!
//! This crate is part of the [lamco-rtc](https://github.com/lamco-admin/lamco-rtc)
//! workspace and is driven by [`lamco-rtc-session`](https://crates.io/crates/lamco-rtc-session),
//! which feeds it frames from the media transport.
//!
//! # Features
//!
//! - **Format Detection**: Native four-character codes mapped to `420f`,
//!   `420v`, `BGRA` or `Unknown`
//! - **Conversion**: Lazily configured hardware context with software fallback
//! - **Scaling**: Aspect-preserving, never up-scaled unless requested
//! - **Rate Gating**: Out-of-order and too-early frames dropped before any work
//! - **Leak Auditing**: Buffer and lock counters with forced cleanup sweeps
//! - **Adaptation Modes**: Auto, Performance, Quality and Compatibility
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use lamco_rtc_frame::{ConverterConfig, FrameConverter, PixelFormat, TransportFrame, FOURCC_420F};
//!
//! let converter = FrameConverter::new(
//!     ConverterConfig::builder()
//!         .target_resolution(1280, 720)
//!         .target_fps(30)
//!         .build(),
//! )
//! .unwrap();
//!
//! // Renderer callback from the media transport
//! let frame = TransportFrame::new(FOURCC_420F, 4, 4, vec![128; 24], Duration::ZERO);
//! converter.on_frame(frame);
//!
//! // Consumer side
//! let latest = converter.latest_frame(Some(PixelFormat::PackedBgra)).unwrap();
//! assert_eq!(latest.dimensions(), (4, 4));
//! ```
//!
//! # Resource Monitoring
//!
//! Buffers produced by the engine are tracked by a shared
//! [`ResourceAccounting`]. A [`ResourceMonitor`] sweeps the cache
//! periodically: entries past their TTL are expired, and when more buffers are
//! outstanding than the leak threshold allows, the oldest entries are
//! force-released. Neither ever interrupts frame delivery.
//!
//! ```rust,no_run
//! use lamco_rtc_frame::{FrameConverter, ResourceMonitor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let converter = FrameConverter::with_default()?;
//! let monitor = ResourceMonitor::start(&converter);
//!
//! // ... stream ...
//!
//! // No sweep runs after this returns
//! monitor.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//!  transport callback ──> on_frame ──> rate gate ──┬──> dropped (counted)
//!                                                  │
//!                                                  ▼
//!                                   ScopedBufferLock + convert + scale
//!                                                  │
//!                                                  ▼
//!  consumers <── latest_frame(hint) <──────── FrameCache ◄── ResourceMonitor
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod accounting;
pub mod adaptation;
pub mod buffer;
pub mod cache;
pub mod config;
pub mod convert;
pub mod converter;
pub mod error;
pub mod format;
pub mod frame;
pub mod gate;
pub mod hardware;
pub mod lock;
pub mod metadata;
pub mod monitor;
pub mod stats;

// =============================================================================
// RE-EXPORTS - PRIMARY API
// =============================================================================

// Engine (primary entry point)
pub use converter::{BgraImage, ConverterCallback, ConverterEvent, FrameConverter, FrameOutcome, SweepReport};
pub use monitor::ResourceMonitor;

// Configuration
pub use adaptation::{AdaptationMode, AdaptationPolicy};
pub use config::{ConverterConfig, ConverterConfigBuilder};

// Errors
pub use error::{FrameError, Result};

// Frame types
pub use format::{fourcc, PixelFormat, FOURCC_420F, FOURCC_420V, FOURCC_BGRA};
pub use frame::{DecodedFrame, FrameId, TransportFrame};
pub use metadata::{ColorPrimaries, FrameMetadata, FrameTiming, Orientation};
pub use stats::{ConverterStats, ProcessingMode};

// =============================================================================
// RE-EXPORTS - ADVANCED API
// =============================================================================

// Buffer ownership
pub use accounting::{BufferTicket, LeakCounters, ResourceAccounting};
pub use buffer::PixelBuffer;
pub use lock::ScopedBufferLock;

// Building blocks
pub use cache::{FrameCache, Lookup};
pub use convert::ScaleFilter;
pub use gate::{DropReason, RateGate};
pub use hardware::HardwareConverter;
pub use stats::FpsEstimator;

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
        assert_eq!(PixelFormat::from_fourcc(FOURCC_420V), PixelFormat::VideoRangeYuv420);
        assert_eq!(AdaptationMode::default(), AdaptationMode::Auto);
    }
}
