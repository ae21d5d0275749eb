//! Bounded exponential backoff
//!
//! Tracks reconnect attempts for one outage. [`Backoff::next_delay`] hands out
//! the delay for the next attempt until the attempt budget is spent.

use std::time::Duration;

use crate::config::BackoffConfig;

/// Attempt counter with capped exponential delays
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    /// Create a backoff allowing `max_attempts` retries
    #[must_use]
    pub fn new(config: BackoffConfig, max_attempts: u32) -> Self {
        Self {
            config,
            max_attempts,
            attempt: 0,
        }
    }

    /// Delay before attempt `attempt` (1-based)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.config.multiplier.max(1.0).powi(exponent);
        let delay = self.config.initial_delay.as_secs_f64() * factor;
        let max = self.config.max_delay.as_secs_f64();

        if !delay.is_finite() || delay >= max {
            self.config.max_delay
        } else {
            Duration::from_secs_f64(delay)
        }
    }

    /// Count one more attempt and return its delay, or `None` when exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempt += 1;
        Some(self.delay_for(self.attempt))
    }

    /// Attempts counted since the last reset
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Maximum attempts per outage
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether the attempt budget is spent
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Start a fresh outage
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let backoff = Backoff::new(BackoffConfig::default(), 10);
        let delays: Vec<u64> = (1..=6).map(|n| backoff.delay_for(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000, 8000]);
    }

    #[test]
    fn test_bounded_attempts() {
        let mut backoff = Backoff::new(BackoffConfig::default(), 3);
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(500)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(2)));
        assert_eq!(backoff.next_delay(), None);
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.attempt(), backoff.max_attempts());

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_zero_attempts() {
        let mut backoff = Backoff::new(BackoffConfig::default(), 0);
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn test_fixed_and_huge_exponent() {
        let backoff = Backoff::new(BackoffConfig::fixed(Duration::from_secs(1)), 5);
        assert_eq!(backoff.delay_for(4), Duration::from_secs(1));

        let backoff = Backoff::new(BackoffConfig::default(), 5);
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_secs(8));
    }
}
