//! Scoped pixel buffer lock
//!
//! [`ScopedBufferLock`] holds the exclusive lock on one [`PixelBuffer`] for
//! as long as it lives. Every successful acquisition is counted on the shared
//! [`ResourceAccounting`], and the matching unlock is counted exactly once:
//! either on an explicit [`release`](ScopedBufferLock::release) or when the
//! guard is dropped, including on early returns through `?`.
//!
//! The guard is deliberately not `Clone`; a lock has a single owner.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use lamco_rtc_frame::{PixelBuffer, PixelFormat, ResourceAccounting, ScopedBufferLock};
//!
//! let accounting = ResourceAccounting::new();
//! let buffer = Arc::new(PixelBuffer::new(PixelFormat::PackedBgra, 1, 1, vec![0; 4]).unwrap());
//!
//! {
//!     let guard = ScopedBufferLock::acquire(Some(&buffer), &accounting).unwrap();
//!     assert!(guard.is_locked());
//!     // Second owner is refused while the first one holds the lock
//!     assert!(ScopedBufferLock::acquire(Some(&buffer), &accounting).is_err());
//! }
//!
//! let counters = accounting.snapshot();
//! assert_eq!(counters.locks_acquired, counters.locks_released);
//! ```

use std::sync::{Arc, Weak};

use tracing::trace;

use crate::accounting::ResourceAccounting;
use crate::buffer::{next_lock_token, PixelBuffer};
use crate::error::{FrameError, Result};

/// RAII lock over a single pixel buffer
#[derive(Debug)]
pub struct ScopedBufferLock {
    buffer: Arc<PixelBuffer>,
    accounting: Weak<ResourceAccounting>,
    token: u64,
    locked: bool,
}

impl ScopedBufferLock {
    /// Lock `buffer` for exclusive use
    ///
    /// Fails with [`FrameError::NullBuffer`] when no buffer is given and with
    /// [`FrameError::BufferAlreadyLocked`] when another owner holds it.
    pub fn acquire(buffer: Option<&Arc<PixelBuffer>>, accounting: &Arc<ResourceAccounting>) -> Result<Self> {
        let buffer = buffer.ok_or(FrameError::NullBuffer)?;
        let token = next_lock_token();

        if !buffer.try_lock(token) {
            return Err(FrameError::BufferAlreadyLocked);
        }
        accounting.record_lock();
        trace!("Pixel buffer locked (token {})", token);

        Ok(Self {
            buffer: Arc::clone(buffer),
            accounting: Arc::downgrade(accounting),
            token,
            locked: true,
        })
    }

    /// The locked buffer
    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    /// Whether this guard still holds its lock
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Unlock now; later calls are no-ops
    pub fn release(&mut self) {
        if !self.locked {
            return;
        }
        self.locked = false;

        // A forced unlock by the resource sweep already counted this unlock
        if self.buffer.unlock(self.token) {
            if let Some(accounting) = self.accounting.upgrade() {
                accounting.record_unlock();
            }
            trace!("Pixel buffer unlocked (token {})", self.token);
        }
    }
}

impl Drop for ScopedBufferLock {
    fn drop(&mut self) {
        self.release();
    }
}
