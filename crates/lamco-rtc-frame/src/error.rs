//! Error types for frame ingestion and conversion
//!
//! Frame-path errors are absorbed by [`FrameConverter`](crate::FrameConverter)
//! and surface only as counters. They are returned directly from the consumer
//! pull API and from the lower-level building blocks.

use thiserror::Error;

use crate::format::PixelFormat;

/// Errors that can occur while ingesting, converting or pulling frames
///
/// # Examples
///
/// ```
/// use lamco_rtc_frame::{FrameConverter, FrameError};
///
/// let converter = FrameConverter::with_default().unwrap();
/// match converter.latest_frame(None) {
///     Ok(frame) => println!("frame #{}", frame.sequence()),
///     Err(FrameError::NoFrameAvailable) => println!("nothing decoded yet"),
///     Err(e) => eprintln!("error: {e}"),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// No frame has been produced yet, or the cache was just cleared
    #[error("No frame available")]
    NoFrameAvailable,

    /// No conversion path exists between the two formats
    ///
    /// Raised when the source format is [`PixelFormat::Unknown`] or when the
    /// hardware converter rejects a pair and no software path exists.
    #[error("Conversion from {from} to {to} is not supported")]
    ConversionUnsupported {
        /// Source format
        from: PixelFormat,
        /// Requested destination format
        to: PixelFormat,
    },

    /// More buffers or locks are outstanding than the leak threshold allows
    ///
    /// Recoverable: the resource sweep force-releases the oldest entries.
    #[error("Resource leak detected: {outstanding} outstanding (threshold {threshold})")]
    ResourceLeakDetected {
        /// `created - released` at the time of detection
        outstanding: u64,
        /// Configured threshold
        threshold: u64,
    },

    /// Attempted to lock a missing pixel buffer
    #[error("Pixel buffer is null")]
    NullBuffer,

    /// The pixel buffer is already exclusively locked by another owner
    #[error("Pixel buffer is already locked")]
    BufferAlreadyLocked,

    /// The hardware conversion context could not be used
    #[error("Hardware conversion unavailable: {0}")]
    HardwareUnavailable(String),

    /// Buffer contents do not match the declared geometry
    #[error("Invalid pixel buffer: {0}")]
    InvalidBuffer(String),

    /// Invalid configuration or argument
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for frame operations
pub type Result<T> = std::result::Result<T, FrameError>;

impl FrameError {
    /// Whether the pipeline can keep running after this error
    ///
    /// Everything except configuration mistakes is recoverable: the frame in
    /// question is dropped and the next one is processed normally.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidParameter(_))
    }

    pub(crate) fn unsupported(from: PixelFormat, to: PixelFormat) -> Self {
        Self::ConversionUnsupported { from, to }
    }

    pub(crate) fn hardware(msg: impl Into<String>) -> Self {
        Self::HardwareUnavailable(msg.into())
    }

    pub(crate) fn invalid_buffer(msg: impl Into<String>) -> Self {
        Self::InvalidBuffer(msg.into())
    }
}
