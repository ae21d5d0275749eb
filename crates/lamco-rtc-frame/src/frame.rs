//! Frame containers
//!
//! [`TransportFrame`] is what the media transport hands to the renderer
//! callback: raw bytes tagged with a native four-character code.
//! [`DecodedFrame`] is what the conversion engine produces and consumers
//! pull: a tracked [`PixelBuffer`] with an identity and a sequence number.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::buffer::PixelBuffer;
use crate::format::PixelFormat;
use crate::metadata::{ColorPrimaries, FrameMetadata, FrameTiming, Orientation};

/// Identity tokens for decoded frames, unique per process
static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u64);

impl FrameId {
    pub(crate) fn next() -> Self {
        Self(NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identity value
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// A decoded frame as delivered by the media transport
#[derive(Debug, Clone)]
pub struct TransportFrame {
    /// Native pixel format code
    pub fourcc: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel bytes, planes back to back
    pub data: Vec<u8>,
    /// Presentation timestamp
    pub timestamp: Duration,
    /// Rotation in degrees the transport reports for the frame
    pub rotation: u32,
    /// Frame duration, when known
    pub duration: Option<Duration>,
    /// Color primaries, when signalled
    pub color_primaries: Option<ColorPrimaries>,
}

impl TransportFrame {
    /// Frame with the given code, geometry, bytes and timestamp
    #[must_use]
    pub fn new(fourcc: u32, width: u32, height: u32, data: Vec<u8>, timestamp: Duration) -> Self {
        Self {
            fourcc,
            width,
            height,
            data,
            timestamp,
            rotation: 0,
            duration: None,
            color_primaries: None,
        }
    }

    /// Format this frame maps to
    #[must_use]
    pub fn format(&self) -> PixelFormat {
        PixelFormat::from_fourcc(self.fourcc)
    }

    /// Attachments extracted from the transport frame
    #[must_use]
    pub fn metadata(&self) -> FrameMetadata {
        FrameMetadata {
            color_primaries: self.color_primaries.unwrap_or_default(),
            timing: FrameTiming {
                pts: self.timestamp,
                duration: self.duration,
            },
            orientation: Orientation::from_degrees(self.rotation),
        }
    }
}

/// A converted frame held by the cache and handed to consumers
///
/// Cloning shares the underlying buffer; it is released when the last clone
/// goes away.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    id: FrameId,
    sequence: u64,
    buffer: Arc<PixelBuffer>,
}

impl DecodedFrame {
    pub(crate) fn new(sequence: u64, buffer: Arc<PixelBuffer>) -> Self {
        Self {
            id: FrameId::next(),
            sequence,
            buffer,
        }
    }

    /// Identity token
    #[must_use]
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Creation sequence number within the converter
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Presentation timestamp
    #[must_use]
    pub fn pts(&self) -> Duration {
        self.buffer.metadata().timing.pts
    }

    /// Pixel format of the buffer
    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.buffer.format()
    }

    /// `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Attachments
    #[must_use]
    pub fn metadata(&self) -> &FrameMetadata {
        self.buffer.metadata()
    }

    /// Shared pixel buffer handle
    #[must_use]
    pub fn buffer(&self) -> &Arc<PixelBuffer> {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FOURCC_BGRA;

    #[test]
    fn test_transport_metadata() {
        let mut frame = TransportFrame::new(FOURCC_BGRA, 1, 1, vec![0; 4], Duration::from_millis(7));
        frame.rotation = 90;
        frame.duration = Some(Duration::from_millis(33));

        let meta = frame.metadata();
        assert_eq!(frame.format(), PixelFormat::PackedBgra);
        assert_eq!(meta.timing.pts, Duration::from_millis(7));
        assert_eq!(meta.orientation, Orientation::Right);
        assert_eq!(meta.color_primaries, ColorPrimaries::Bt709);
    }

    #[test]
    fn test_frame_ids_unique() {
        let buffer = Arc::new(PixelBuffer::new(PixelFormat::PackedBgra, 1, 1, vec![0; 4]).expect("buffer"));
        let a = DecodedFrame::new(1, Arc::clone(&buffer));
        let b = DecodedFrame::new(2, buffer);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.sequence(), 1);
    }
}
