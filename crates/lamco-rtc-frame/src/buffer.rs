//! Pixel buffers
//!
//! A [`PixelBuffer`] stands in for a GPU-backed image surface: immutable
//! pixel storage, a format tag, its attachments and an exclusive lock word.
//! Buffers produced by the conversion engine carry a
//! [`BufferTicket`](crate::accounting::BufferTicket) so their release is
//! counted when the last reference goes away.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::accounting::{BufferTicket, ResourceAccounting};
use crate::error::{FrameError, Result};
use crate::format::{chroma_plane_size, PixelFormat};
use crate::metadata::FrameMetadata;

/// Lock owner tokens, never zero
static NEXT_LOCK_TOKEN: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_lock_token() -> u64 {
    NEXT_LOCK_TOKEN.fetch_add(1, Ordering::Relaxed)
}

/// Image storage with format, geometry and attachments
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
    metadata: FrameMetadata,
    /// Plane lengths of a 4:2:0 buffer, zero otherwise
    planes: (usize, usize),
    /// 0 when unlocked, otherwise the owner's token
    lock_owner: AtomicU64,
    ticket: Option<BufferTicket>,
}

impl PixelBuffer {
    /// Wrap pixel data, checking it against the declared geometry
    ///
    /// `Unknown` formats only need to be non-empty since their layout cannot
    /// be checked. Geometry whose byte size does not fit in `usize` is
    /// rejected.
    pub fn new(format: PixelFormat, width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(FrameError::invalid_buffer(format!("zero dimension {width}x{height}")));
        }

        let mut planes = (0, 0);
        if format == PixelFormat::Unknown {
            if data.is_empty() {
                return Err(FrameError::invalid_buffer("empty buffer"));
            }
        } else {
            let needed = format
                .buffer_size(width, height)
                .ok_or_else(|| FrameError::invalid_buffer(format!("{format} {width}x{height} is too large")))?;
            if data.len() < needed {
                return Err(FrameError::invalid_buffer(format!(
                    "{format} {width}x{height} needs {needed} bytes, got {}",
                    data.len()
                )));
            }
            if format.is_yuv() {
                let chroma = chroma_plane_size(width, height).unwrap_or_default();
                planes = (needed - chroma, chroma);
            }
        }

        Ok(Self {
            width,
            height,
            format,
            data,
            metadata: FrameMetadata::default(),
            planes,
            lock_owner: AtomicU64::new(0),
            ticket: None,
        })
    }

    /// Attach metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: FrameMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Register this buffer with an accounting handle
    #[must_use]
    pub fn tracked(mut self, accounting: &Arc<ResourceAccounting>) -> Self {
        if self.ticket.is_none() {
            self.ticket = Some(accounting.issue_ticket());
        }
        self
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixel format tag
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw pixel bytes, planes stored back to back
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Luma plane of a 4:2:0 buffer, or the whole buffer otherwise
    pub fn luma_plane(&self) -> &[u8] {
        if self.format.is_yuv() {
            &self.data[..self.planes.0]
        } else {
            &self.data
        }
    }

    /// Interleaved CbCr plane of a 4:2:0 buffer, empty otherwise
    pub fn chroma_plane(&self) -> &[u8] {
        if self.format.is_yuv() {
            let (luma, chroma) = self.planes;
            &self.data[luma..luma + chroma]
        } else {
            &[]
        }
    }

    /// Attachments
    pub fn metadata(&self) -> &FrameMetadata {
        &self.metadata
    }

    /// Whether the buffer is counted by a [`ResourceAccounting`]
    pub fn is_tracked(&self) -> bool {
        self.ticket.is_some()
    }

    /// Whether some owner currently holds the exclusive lock
    pub fn is_locked(&self) -> bool {
        self.lock_owner.load(Ordering::Acquire) != 0
    }

    pub(crate) fn try_lock(&self, token: u64) -> bool {
        self.lock_owner
            .compare_exchange(0, token, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Unlock only if `token` still owns the lock
    pub(crate) fn unlock(&self, token: u64) -> bool {
        self.lock_owner
            .compare_exchange(token, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Drop whatever lock is held; returns whether one was
    pub(crate) fn force_unlock(&self) -> bool {
        self.lock_owner.swap(0, Ordering::AcqRel) != 0
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .field("locked", &self.is_locked())
            .field("tracked", &self.is_tracked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_validation() {
        assert!(PixelBuffer::new(PixelFormat::PackedBgra, 2, 2, vec![0; 16]).is_ok());
        assert!(PixelBuffer::new(PixelFormat::PackedBgra, 2, 2, vec![0; 15]).is_err());
        assert!(PixelBuffer::new(PixelFormat::FullRangeYuv420, 0, 2, vec![0; 16]).is_err());
        assert!(PixelBuffer::new(PixelFormat::Unknown, 2, 2, vec![1]).is_ok());
        assert!(PixelBuffer::new(PixelFormat::Unknown, 2, 2, Vec::new()).is_err());
    }

    #[test]
    fn test_oversized_geometry_rejected() {
        let err = PixelBuffer::new(PixelFormat::PackedBgra, u32::MAX, u32::MAX, vec![0; 16]).expect_err("too large");
        assert!(matches!(err, FrameError::InvalidBuffer(_)));
        assert!(PixelBuffer::new(PixelFormat::VideoRangeYuv420, u32::MAX, u32::MAX, vec![0; 16]).is_err());
        // Unknown layouts are never sized
        assert!(PixelBuffer::new(PixelFormat::Unknown, u32::MAX, u32::MAX, vec![0; 16]).is_ok());
    }

    #[test]
    fn test_planes() {
        let data: Vec<u8> = (0..6).collect();
        let buffer = PixelBuffer::new(PixelFormat::VideoRangeYuv420, 2, 2, data).expect("buffer");
        assert_eq!(buffer.luma_plane(), &[0, 1, 2, 3]);
        assert_eq!(buffer.chroma_plane(), &[4, 5]);
    }

    #[test]
    fn test_lock_word() {
        let buffer = PixelBuffer::new(PixelFormat::PackedBgra, 1, 1, vec![0; 4]).expect("buffer");
        assert!(buffer.try_lock(7));
        assert!(!buffer.try_lock(8));
        assert!(!buffer.unlock(8));
        assert!(buffer.unlock(7));
        assert!(!buffer.is_locked());

        assert!(buffer.try_lock(9));
        assert!(buffer.force_unlock());
        assert!(!buffer.force_unlock());
    }

    #[test]
    fn test_tracking() {
        let accounting = ResourceAccounting::new();
        let buffer = PixelBuffer::new(PixelFormat::PackedBgra, 1, 1, vec![0; 4])
            .expect("buffer")
            .tracked(&accounting)
            .tracked(&accounting);
        assert!(buffer.is_tracked());
        assert_eq!(accounting.snapshot().buffers_created, 1);

        drop(buffer);
        assert_eq!(accounting.snapshot().outstanding_buffers(), 0);
    }
}
