//! Resource accounting for pixel buffers and buffer locks
//!
//! One [`ResourceAccounting`] is shared by reference between the frame path,
//! the buffer locks and the resource monitor. Counters only ever grow;
//! `outstanding = created - released` is derived on read.
//!
//! Buffer releases are recorded by a [`BufferTicket`] attached to each
//! tracked buffer. The ticket records exactly one release when it drops, so a
//! buffer cannot be released twice no matter which path (explicit release,
//! cache expiry, forced cleanup) lets go of it last.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Point-in-time copy of the resource counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeakCounters {
    /// Pixel buffers created since the last reset
    pub buffers_created: u64,

    /// Pixel buffers released since the last reset
    pub buffers_released: u64,

    /// Successful buffer locks since the last reset
    pub locks_acquired: u64,

    /// Buffer unlocks since the last reset
    pub locks_released: u64,

    /// Entries force-released by the resource sweep
    pub forced_releases: u64,

    /// Sweeps that found the leak threshold exceeded
    pub leak_events: u64,

    /// Buffers created over the whole lifetime (survives reset)
    pub lifetime_buffers_created: u64,

    /// Buffers released over the whole lifetime (survives reset)
    pub lifetime_buffers_released: u64,
}

impl LeakCounters {
    /// Buffers currently alive
    #[must_use]
    pub fn outstanding_buffers(&self) -> u64 {
        self.buffers_created.saturating_sub(self.buffers_released)
    }

    /// Locks currently held
    #[must_use]
    pub fn outstanding_locks(&self) -> u64 {
        self.locks_acquired.saturating_sub(self.locks_released)
    }
}

/// Shared creation/release tallies
#[derive(Debug, Default)]
pub struct ResourceAccounting {
    counters: Mutex<LeakCounters>,
}

impl ResourceAccounting {
    /// Create a new, zeroed accounting handle
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a new buffer and return the ticket that will record its release
    pub fn issue_ticket(self: &Arc<Self>) -> BufferTicket {
        {
            let mut c = self.counters.lock();
            c.buffers_created += 1;
            c.lifetime_buffers_created += 1;
        }
        BufferTicket {
            accounting: Arc::downgrade(self),
        }
    }

    pub(crate) fn record_buffer_released(&self) {
        let mut c = self.counters.lock();
        c.lifetime_buffers_released += 1;
        // A ticket issued before a reset must not push released above created
        if c.buffers_released < c.buffers_created {
            c.buffers_released += 1;
        }
    }

    pub(crate) fn record_lock(&self) {
        self.counters.lock().locks_acquired += 1;
    }

    pub(crate) fn record_unlock(&self) {
        let mut c = self.counters.lock();
        if c.locks_released < c.locks_acquired {
            c.locks_released += 1;
        }
    }

    pub(crate) fn record_leak_event(&self) {
        self.counters.lock().leak_events += 1;
    }

    pub(crate) fn record_forced_release(&self) {
        self.counters.lock().forced_releases += 1;
    }

    /// Copy of the current counters
    #[must_use]
    pub fn snapshot(&self) -> LeakCounters {
        *self.counters.lock()
    }

    /// Zero all counters except the lifetime totals
    ///
    /// Buffers and locks still alive at reset time are carried over as
    /// outstanding so later releases stay balanced.
    pub fn reset(&self) {
        let mut c = self.counters.lock();
        let outstanding_buffers = c.outstanding_buffers();
        let outstanding_locks = c.outstanding_locks();
        *c = LeakCounters {
            buffers_created: outstanding_buffers,
            locks_acquired: outstanding_locks,
            lifetime_buffers_created: c.lifetime_buffers_created,
            lifetime_buffers_released: c.lifetime_buffers_released,
            ..LeakCounters::default()
        };
    }
}

/// Records the release of one tracked buffer when dropped
#[derive(Debug)]
pub struct BufferTicket {
    accounting: Weak<ResourceAccounting>,
}

impl Drop for BufferTicket {
    fn drop(&mut self) {
        if let Some(accounting) = self.accounting.upgrade() {
            accounting.record_buffer_released();
        }
    }
}
