//! Frame statistics
//!
//! [`FpsEstimator`] smooths inter-frame intervals with an exponentially
//! weighted moving average, so a single late frame does not swing the
//! reported rate. [`ConverterStats`] is the snapshot handed to consumers.

use std::time::Duration;

use crate::format::PixelFormat;

/// Conversion path taken for the most recent frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// No frame processed yet
    #[default]
    Idle,
    /// Frame already in the output format and size
    Passthrough,
    /// Converted by the hardware context
    Hardware,
    /// Converted by the software path
    Software,
}

impl ProcessingMode {
    /// Short name used in status messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Passthrough => "passthrough",
            Self::Hardware => "hardware",
            Self::Software => "software",
        }
    }
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// EWMA frame rate estimator over presentation timestamps
#[derive(Debug, Clone)]
pub struct FpsEstimator {
    /// Weight of the newest sample (0, 1]
    alpha: f64,
    last: Option<Duration>,
    avg_interval: Option<f64>,
}

impl FpsEstimator {
    /// Create an estimator with smoothing factor `alpha`
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            last: None,
            avg_interval: None,
        }
    }

    /// Feed the timestamp of a delivered frame
    pub fn record(&mut self, timestamp: Duration) {
        if let Some(last) = self.last {
            if timestamp > last {
                let interval = (timestamp - last).as_secs_f64();
                self.avg_interval = Some(match self.avg_interval {
                    Some(avg) => avg + self.alpha * (interval - avg),
                    None => interval,
                });
            }
        }
        self.last = Some(timestamp);
    }

    /// Current estimate, 0.0 until two frames have been seen
    #[must_use]
    pub fn fps(&self) -> f64 {
        match self.avg_interval {
            Some(avg) if avg > 0.0 => 1.0 / avg,
            _ => 0.0,
        }
    }

    /// Forget all samples
    pub fn reset(&mut self) {
        self.last = None;
        self.avg_interval = None;
    }
}

/// Snapshot of converter statistics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConverterStats {
    /// Frames received from the transport
    pub frame_count: u64,

    /// Frames converted and cached
    pub processed_count: u64,

    /// Frames dropped by the rate gate or a failed conversion
    pub dropped_frame_count: u64,

    /// Smoothed delivery rate in frames per second
    pub estimated_fps: f64,

    /// Tracked buffers not yet released
    pub outstanding_buffers: u64,

    /// Buffer locks not yet released
    pub outstanding_locks: u64,

    /// Cache entries force-released by the resource sweep
    pub forced_releases: u64,

    /// Sweeps that found the leak threshold exceeded
    pub leak_events: u64,

    /// Frames currently held by the cache
    pub cached_frames: usize,

    /// Format of the most recent incoming frame
    pub detected_format: PixelFormat,

    /// Path taken for the most recent frame
    pub processing_mode: ProcessingMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_needs_two_samples() {
        let mut fps = FpsEstimator::new(0.2);
        assert_eq!(fps.fps(), 0.0);
        fps.record(Duration::ZERO);
        assert_eq!(fps.fps(), 0.0);
        fps.record(Duration::from_millis(40));
        assert!((fps.fps() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_fps_is_smoothed() {
        let mut fps = FpsEstimator::new(0.1);
        for i in 0..50u64 {
            fps.record(Duration::from_millis(i * 20));
        }
        assert!((fps.fps() - 50.0).abs() < 0.01);

        // One long gap moves the estimate only partially
        fps.record(Duration::from_millis(49 * 20 + 200));
        let estimate = fps.fps();
        assert!(estimate < 50.0 && estimate > 20.0, "estimate {estimate}");
    }

    #[test]
    fn test_fps_reset() {
        let mut fps = FpsEstimator::new(0.5);
        fps.record(Duration::ZERO);
        fps.record(Duration::from_millis(10));
        fps.reset();
        assert_eq!(fps.fps(), 0.0);
    }

    #[test]
    fn test_processing_mode_names() {
        assert_eq!(ProcessingMode::default(), ProcessingMode::Idle);
        assert_eq!(ProcessingMode::Hardware.to_string(), "hardware");
    }
}
