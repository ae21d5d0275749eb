//! Converter Configuration
//!
//! Provides configuration options for the frame conversion engine with a
//! builder pattern for ergonomic construction.
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use lamco_rtc_frame::{ConverterConfig, PixelFormat};
//!
//! // Using builder pattern
//! let config = ConverterConfig::builder()
//!     .target_resolution(1280, 720)
//!     .target_fps(30)
//!     .output_format(PixelFormat::PackedBgra)
//!     .cache_ttl(Duration::from_secs(1))
//!     .build();
//!
//! // Using struct literal with defaults
//! let config = ConverterConfig {
//!     cache_capacity: 4,
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use crate::adaptation::AdaptationMode;
use crate::format::PixelFormat;

/// Configuration for the frame conversion engine
///
/// Use [`ConverterConfig::builder()`] for ergonomic construction or struct
/// literal syntax with [`Default::default()`].
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Target output width (default: 1920)
    pub target_width: u32,

    /// Target output height (default: 1080)
    pub target_height: u32,

    /// Target delivery rate (default: 30)
    ///
    /// Frames arriving faster are dropped by the rate gate. 0 disables rate
    /// gating.
    pub target_fps: u32,

    /// Format every frame is converted to on arrival (default: none)
    ///
    /// `None` caches each frame in the format it arrived in; consumers ask
    /// for another one through the hint on
    /// [`latest_frame`](crate::FrameConverter::latest_frame).
    pub output_format: Option<PixelFormat>,

    /// Allow scaling above the source resolution (default: false)
    pub allow_upscale: bool,

    /// Keep the source aspect ratio when scaling (default: true)
    ///
    /// When false the frame is resized to exactly the target, distorting it.
    pub preserve_aspect: bool,

    /// Frames kept in the decoded-frame cache (default: 3)
    pub cache_capacity: usize,

    /// Maximum time a frame stays cached (default: 2s)
    pub cache_ttl: Duration,

    /// Outstanding buffers tolerated before forced cleanup (default: 10)
    pub leak_threshold: u64,

    /// Period of the background resource sweep (default: 1s)
    pub sweep_interval: Duration,

    /// Rate gate jitter tolerance as a fraction of the frame interval
    /// (default: 0.1)
    pub gate_tolerance: f64,

    /// Maximum wait for the hardware context before falling back to
    /// software (default: 2ms)
    pub hardware_wait: Duration,

    /// Weight of the newest interval in the fps estimate (default: 0.1)
    pub fps_smoothing: f64,

    /// Adaptation mode at startup (default: Auto)
    pub adaptation_mode: AdaptationMode,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            target_width: 1920,
            target_height: 1080,
            target_fps: 30,
            output_format: None,
            allow_upscale: false,
            preserve_aspect: true,
            cache_capacity: 3,
            cache_ttl: Duration::from_secs(2),
            leak_threshold: 10,
            sweep_interval: Duration::from_secs(1),
            gate_tolerance: 0.1,
            hardware_wait: Duration::from_millis(2),
            fps_smoothing: 0.1,
            adaptation_mode: AdaptationMode::Auto,
        }
    }
}

impl ConverterConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder::default()
    }

    /// Validate configuration and return any issues
    ///
    /// Returns `Ok(())` if configuration is valid, or a list of issues.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut issues = Vec::new();

        if self.target_width == 0 || self.target_height == 0 {
            issues.push("target resolution must be non-zero".to_string());
        }

        if self.target_fps > 240 {
            issues.push("target_fps should not exceed 240".to_string());
        }

        if self.output_format == Some(PixelFormat::Unknown) {
            issues.push("output_format cannot be Unknown".to_string());
        }

        if self.cache_capacity == 0 {
            issues.push("cache_capacity must be at least 1".to_string());
        }

        if self.cache_ttl.is_zero() {
            issues.push("cache_ttl must be non-zero".to_string());
        }

        if self.leak_threshold < self.cache_capacity as u64 {
            issues.push("leak_threshold must be at least cache_capacity".to_string());
        }

        if self.sweep_interval < Duration::from_millis(10) {
            issues.push("sweep_interval should be at least 10ms".to_string());
        }

        if !(0.0..1.0).contains(&self.gate_tolerance) {
            issues.push("gate_tolerance must be in [0, 1)".to_string());
        }

        if !(self.fps_smoothing > 0.0 && self.fps_smoothing <= 1.0) {
            issues.push("fps_smoothing must be in (0, 1]".to_string());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}

/// Builder for [`ConverterConfig`]
///
/// Provides a fluent interface for constructing configuration.
#[derive(Debug, Clone, Default)]
pub struct ConverterConfigBuilder {
    target_resolution: Option<(u32, u32)>,
    target_fps: Option<u32>,
    output_format: Option<PixelFormat>,
    allow_upscale: Option<bool>,
    preserve_aspect: Option<bool>,
    cache_capacity: Option<usize>,
    cache_ttl: Option<Duration>,
    leak_threshold: Option<u64>,
    sweep_interval: Option<Duration>,
    gate_tolerance: Option<f64>,
    hardware_wait: Option<Duration>,
    fps_smoothing: Option<f64>,
    adaptation_mode: Option<AdaptationMode>,
}

impl ConverterConfigBuilder {
    /// Set target output resolution
    #[must_use]
    pub fn target_resolution(mut self, width: u32, height: u32) -> Self {
        self.target_resolution = Some((width, height));
        self
    }

    /// Set target delivery rate
    #[must_use]
    pub fn target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Convert every frame to `format` on arrival
    #[must_use]
    pub fn output_format(mut self, format: PixelFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Allow scaling above the source resolution
    #[must_use]
    pub fn allow_upscale(mut self, enable: bool) -> Self {
        self.allow_upscale = Some(enable);
        self
    }

    /// Keep aspect ratio when scaling
    #[must_use]
    pub fn preserve_aspect(mut self, enable: bool) -> Self {
        self.preserve_aspect = Some(enable);
        self
    }

    /// Set cache capacity
    #[must_use]
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// Set cache entry lifetime
    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Set leak threshold
    #[must_use]
    pub fn leak_threshold(mut self, threshold: u64) -> Self {
        self.leak_threshold = Some(threshold);
        self
    }

    /// Set resource sweep period
    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Set rate gate jitter tolerance
    #[must_use]
    pub fn gate_tolerance(mut self, tolerance: f64) -> Self {
        self.gate_tolerance = Some(tolerance);
        self
    }

    /// Set hardware context wait bound
    #[must_use]
    pub fn hardware_wait(mut self, wait: Duration) -> Self {
        self.hardware_wait = Some(wait);
        self
    }

    /// Set fps estimator smoothing factor
    #[must_use]
    pub fn fps_smoothing(mut self, alpha: f64) -> Self {
        self.fps_smoothing = Some(alpha);
        self
    }

    /// Set initial adaptation mode
    #[must_use]
    pub fn adaptation_mode(mut self, mode: AdaptationMode) -> Self {
        self.adaptation_mode = Some(mode);
        self
    }

    /// Build the configuration
    ///
    /// Returns a [`ConverterConfig`] with builder values overriding defaults.
    #[must_use]
    pub fn build(self) -> ConverterConfig {
        let defaults = ConverterConfig::default();
        let (target_width, target_height) = self
            .target_resolution
            .unwrap_or((defaults.target_width, defaults.target_height));

        ConverterConfig {
            target_width,
            target_height,
            target_fps: self.target_fps.unwrap_or(defaults.target_fps),
            output_format: self.output_format.or(defaults.output_format),
            allow_upscale: self.allow_upscale.unwrap_or(defaults.allow_upscale),
            preserve_aspect: self.preserve_aspect.unwrap_or(defaults.preserve_aspect),
            cache_capacity: self.cache_capacity.unwrap_or(defaults.cache_capacity),
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            leak_threshold: self.leak_threshold.unwrap_or(defaults.leak_threshold),
            sweep_interval: self.sweep_interval.unwrap_or(defaults.sweep_interval),
            gate_tolerance: self.gate_tolerance.unwrap_or(defaults.gate_tolerance),
            hardware_wait: self.hardware_wait.unwrap_or(defaults.hardware_wait),
            fps_smoothing: self.fps_smoothing.unwrap_or(defaults.fps_smoothing),
            adaptation_mode: self.adaptation_mode.unwrap_or(defaults.adaptation_mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert_eq!((config.target_width, config.target_height), (1920, 1080));
        assert_eq!(config.target_fps, 30);
        assert_eq!(config.output_format, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ConverterConfig::builder()
            .target_resolution(640, 480)
            .target_fps(15)
            .cache_capacity(5)
            .adaptation_mode(AdaptationMode::Quality)
            .output_format(PixelFormat::VideoRangeYuv420)
            .build();

        assert_eq!(config.target_width, 640);
        assert_eq!(config.target_fps, 15);
        assert_eq!(config.cache_capacity, 5);
        assert_eq!(config.adaptation_mode, AdaptationMode::Quality);
        assert_eq!(config.output_format, Some(PixelFormat::VideoRangeYuv420));
        // Unset values keep defaults
        assert_eq!(config.leak_threshold, 10);
    }

    #[test]
    fn test_validation() {
        let config = ConverterConfig {
            target_width: 0,
            cache_capacity: 0,
            gate_tolerance: 1.5,
            output_format: Some(PixelFormat::Unknown),
            ..Default::default()
        };
        let issues = config.validate().expect_err("invalid");
        assert_eq!(issues.len(), 4);

        let config = ConverterConfig {
            cache_capacity: 20,
            leak_threshold: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
