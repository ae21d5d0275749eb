//! Decoded-frame cache
//!
//! Holds the most recent converted frames, oldest first, with a hard
//! capacity. Each entry records when it entered the cache; that instant,
//! not the presentation timestamp, drives TTL expiry.
//!
//! Entries leave the cache by eviction, expiry, forced release or a clear.
//! Removing an entry only drops the cache's handle; the buffer is released
//! once every consumer clone of the frame is gone as well.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::{FrameError, Result};
use crate::format::PixelFormat;
use crate::frame::DecodedFrame;

/// Outcome of [`FrameCache::lookup`]
#[derive(Debug, Clone)]
pub enum Lookup {
    /// Newest frame already in the requested format
    Hit(DecodedFrame),
    /// Newest frame, still to be converted to `to`
    Convert {
        /// Cached frame
        frame: DecodedFrame,
        /// Requested format
        to: PixelFormat,
    },
}

#[derive(Debug)]
struct CacheEntry {
    frame: DecodedFrame,
    cached_at: Instant,
}

/// Bounded store of recent decoded frames
#[derive(Debug)]
pub struct FrameCache {
    entries: VecDeque<CacheEntry>,
    capacity: usize,
}

impl FrameCache {
    /// Create a cache holding at most `capacity` frames (minimum 1)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of frames held
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames currently held
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a frame as the newest entry
    ///
    /// Refuses frames whose timestamp is below the newest cached one so
    /// cached timestamps never decrease. Returns the evicted entry, if the
    /// cache was full.
    pub fn insert(&mut self, frame: DecodedFrame, now: Instant) -> Result<Option<DecodedFrame>> {
        if let Some(newest) = self.entries.back() {
            if frame.pts() < newest.frame.pts() {
                return Err(FrameError::invalid_buffer(format!(
                    "pts {:?} older than cached {:?}",
                    frame.pts(),
                    newest.frame.pts()
                )));
            }
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front().map(|e| e.frame)
        } else {
            None
        };
        self.entries.push_back(CacheEntry { frame, cached_at: now });
        Ok(evicted)
    }

    /// Newest frame, if any
    #[must_use]
    pub fn newest(&self) -> Option<&DecodedFrame> {
        self.entries.back().map(|e| &e.frame)
    }

    /// Newest frame, matched against a format hint
    ///
    /// A mismatch is reported as [`Lookup::Convert`] so the caller can run
    /// the conversion step without holding the cache.
    pub fn lookup(&self, hint: Option<PixelFormat>) -> Result<Lookup> {
        let newest = self.newest().ok_or(FrameError::NoFrameAvailable)?;
        Ok(match hint {
            Some(to) if to != newest.format() => Lookup::Convert {
                frame: newest.clone(),
                to,
            },
            _ => Lookup::Hit(newest.clone()),
        })
    }

    /// Remove entries cached longer than `ttl` ago
    pub fn expire(&mut self, now: Instant, ttl: Duration) -> Vec<DecodedFrame> {
        let mut expired = Vec::new();
        // Entries are in insertion order, so expired ones are at the front
        while let Some(entry) = self.entries.front() {
            if now.saturating_duration_since(entry.cached_at) <= ttl {
                break;
            }
            if let Some(entry) = self.entries.pop_front() {
                expired.push(entry.frame);
            }
        }
        expired
    }

    /// Remove up to `count` of the oldest entries
    pub fn take_oldest(&mut self, count: usize) -> Vec<DecodedFrame> {
        let count = count.min(self.entries.len());
        self.entries.drain(..count).map(|e| e.frame).collect()
    }

    /// Age of the oldest entry
    #[must_use]
    pub fn oldest_age(&self, now: Instant) -> Option<Duration> {
        self.entries
            .front()
            .map(|e| now.saturating_duration_since(e.cached_at))
    }

    /// Remove every entry
    pub fn clear(&mut self) -> Vec<DecodedFrame> {
        self.entries.drain(..).map(|e| e.frame).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::buffer::PixelBuffer;
    use crate::metadata::FrameMetadata;

    fn frame(seq: u64, pts_ms: u64) -> DecodedFrame {
        let buffer = PixelBuffer::new(PixelFormat::PackedBgra, 1, 1, vec![0; 4])
            .expect("buffer")
            .with_metadata(FrameMetadata::at(Duration::from_millis(pts_ms)));
        DecodedFrame::new(seq, Arc::new(buffer))
    }

    #[test]
    fn test_empty_lookup() {
        let cache = FrameCache::new(3);
        let err = cache.lookup(None).expect_err("empty");
        assert_eq!(err, FrameError::NoFrameAvailable);
    }

    #[test]
    fn test_bounded_eviction() {
        let mut cache = FrameCache::new(2);
        let now = Instant::now();
        assert!(cache.insert(frame(1, 10), now).expect("insert").is_none());
        assert!(cache.insert(frame(2, 20), now).expect("insert").is_none());

        let evicted = cache.insert(frame(3, 30), now).expect("insert").expect("evicted");
        assert_eq!(evicted.sequence(), 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.newest().map(DecodedFrame::sequence), Some(3));
    }

    #[test]
    fn test_rejects_older_timestamp() {
        let mut cache = FrameCache::new(4);
        let now = Instant::now();
        cache.insert(frame(1, 50), now).expect("insert");
        assert!(cache.insert(frame(2, 40), now).is_err());
        assert_eq!(cache.newest().map(DecodedFrame::pts), Some(Duration::from_millis(50)));
    }

    #[test]
    fn test_lookup_hint() {
        let mut cache = FrameCache::new(2);
        cache.insert(frame(1, 0), Instant::now()).expect("insert");

        match cache.lookup(Some(PixelFormat::PackedBgra)).expect("lookup") {
            Lookup::Hit(f) => assert_eq!(f.sequence(), 1),
            Lookup::Convert { .. } => panic!("same format needs no conversion"),
        }
        match cache.lookup(Some(PixelFormat::FullRangeYuv420)).expect("lookup") {
            Lookup::Convert { frame, to } => {
                assert_eq!(frame.sequence(), 1);
                assert_eq!(to, PixelFormat::FullRangeYuv420);
            }
            Lookup::Hit(_) => panic!("format mismatch must convert"),
        }
    }

    #[test]
    fn test_expire_by_cache_age() {
        let mut cache = FrameCache::new(4);
        let start = Instant::now();
        cache.insert(frame(1, 0), start).expect("insert");
        cache.insert(frame(2, 10), start + Duration::from_secs(2)).expect("insert");

        let expired = cache.expire(start + Duration::from_secs(3), Duration::from_millis(1500));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].sequence(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_take_oldest_and_clear() {
        let mut cache = FrameCache::new(4);
        let now = Instant::now();
        for i in 0..4 {
            cache.insert(frame(i, i * 10), now).expect("insert");
        }
        let taken = cache.take_oldest(2);
        assert_eq!(taken.iter().map(DecodedFrame::sequence).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(cache.take_oldest(10).len(), 2);
        assert!(cache.clear().is_empty());
    }
}
