//! Frame rate gate
//!
//! Decides per frame whether it is delivered or dropped, before any
//! conversion work is done. Two rules apply, in order:
//!
//! 1. The timestamp must be strictly greater than the last accepted one.
//!    Duplicates and out-of-order arrivals are dropped, never reordered.
//! 2. The time since the last accepted frame must cover the minimum
//!    inter-frame interval `1 / target_fps`, shortened by a jitter tolerance.
//!
//! A dropped frame leaves the gate untouched.

use std::time::Duration;

/// Why a frame was refused by the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Timestamp not after the last accepted frame
    OutOfOrder,
    /// Arrived before the minimum inter-frame interval elapsed
    TooSoon,
}

/// Rate gate over presentation timestamps
#[derive(Debug, Clone)]
pub struct RateGate {
    last_accepted: Option<Duration>,
    min_interval: Duration,
    tolerance: f64,
}

impl RateGate {
    /// Create a gate for `target_fps` with a jitter `tolerance` in `[0, 1)`
    ///
    /// A target of 0 disables interval gating; ordering is still enforced.
    #[must_use]
    pub fn new(target_fps: u32, tolerance: f64) -> Self {
        let mut gate = Self {
            last_accepted: None,
            min_interval: Duration::ZERO,
            tolerance: tolerance.clamp(0.0, 0.99),
        };
        gate.set_target_fps(target_fps);
        gate
    }

    /// Change the target rate; applies from the next frame on
    pub fn set_target_fps(&mut self, target_fps: u32) {
        self.min_interval = if target_fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tolerance) / f64::from(target_fps))
        };
    }

    /// Minimum accepted spacing between frames, tolerance applied
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Check a frame without accepting it
    #[must_use]
    pub fn should_drop(&self, timestamp: Duration) -> Option<DropReason> {
        let Some(last) = self.last_accepted else {
            return None;
        };
        if timestamp <= last {
            return Some(DropReason::OutOfOrder);
        }
        if timestamp - last < self.min_interval {
            return Some(DropReason::TooSoon);
        }
        None
    }

    /// Check a frame and, if it passes, record it as accepted
    pub fn admit(&mut self, timestamp: Duration) -> Result<(), DropReason> {
        match self.should_drop(timestamp) {
            Some(reason) => Err(reason),
            None => {
                self.last_accepted = Some(timestamp);
                Ok(())
            }
        }
    }

    /// Forget the last accepted timestamp
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_first_frame_always_passes() {
        let mut gate = RateGate::new(30, 0.1);
        assert_eq!(gate.admit(ms(0)), Ok(()));
        assert_eq!(gate.should_drop(ms(0)), Some(DropReason::OutOfOrder));
    }

    #[test]
    fn test_out_of_order_and_duplicates() {
        let mut gate = RateGate::new(0, 0.1);
        gate.admit(ms(100)).expect("first");
        assert_eq!(gate.admit(ms(100)), Err(DropReason::OutOfOrder));
        assert_eq!(gate.admit(ms(50)), Err(DropReason::OutOfOrder));
        assert_eq!(gate.admit(ms(101)), Ok(()));
    }

    #[test]
    fn test_drop_does_not_mutate() {
        let mut gate = RateGate::new(10, 0.1);
        gate.admit(ms(0)).expect("first");
        assert_eq!(gate.admit(ms(20)), Err(DropReason::TooSoon));
        // Still measured from the first frame
        assert_eq!(gate.should_drop(ms(95)), None);
    }

    #[test]
    fn test_tolerance_absorbs_jitter() {
        // 30 fps = 33.3ms, tolerance 10% accepts from 30ms
        let mut gate = RateGate::new(30, 0.1);
        gate.admit(ms(0)).expect("first");
        assert_eq!(gate.admit(ms(29)), Err(DropReason::TooSoon));
        assert_eq!(gate.admit(ms(31)), Ok(()));
    }

    #[test]
    fn test_converges_to_target_rate() {
        // 60 fps input gated to 30 fps
        let mut gate = RateGate::new(30, 0.1);
        let input = 600u64;
        let mut accepted = 0u64;
        let mut dropped = 0u64;
        for i in 0..input {
            let ts = Duration::from_micros(i * 16_667);
            match gate.admit(ts) {
                Ok(()) => accepted += 1,
                Err(_) => dropped += 1,
            }
        }

        assert_eq!(accepted + dropped, input);
        // 10 seconds of input
        let rate = accepted as f64 / 10.0;
        assert!((rate - 30.0).abs() < 1.5, "rate {rate}");
    }

    #[test]
    fn test_retarget_applies_to_next_frame() {
        let mut gate = RateGate::new(30, 0.0);
        gate.admit(ms(0)).expect("first");
        gate.set_target_fps(10);
        assert_eq!(gate.admit(ms(40)), Err(DropReason::TooSoon));
        assert_eq!(gate.admit(ms(100)), Ok(()));
    }
}
