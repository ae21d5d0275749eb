//! Adaptation modes
//!
//! An [`AdaptationMode`] trades resolution and frame rate against cost. The
//! engine resolves the mode and its configured targets into an
//! [`AdaptationPolicy`] whenever either changes; the frame path only reads
//! the resolved policy.

use crate::format::PixelFormat;

/// Resolution cap used by the constrained modes
pub const CONSTRAINED_RESOLUTION: (u32, u32) = (1280, 720);

/// Frame rate cap used by the constrained modes
pub const CONSTRAINED_FPS: u32 = 30;

/// Resolution, frame rate and conversion path trade-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdaptationMode {
    /// Configured targets, hardware conversion when available
    #[default]
    Auto,
    /// Capped at 720p30 to keep per-frame cost low
    Performance,
    /// Configured targets with no caps
    Quality,
    /// Capped at 720p30, software path only, full range 4:2:0 output
    Compatibility,
}

impl AdaptationMode {
    /// Short name used in logs and status messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Performance => "performance",
            Self::Quality => "quality",
            Self::Compatibility => "compatibility",
        }
    }

    /// Resolve this mode against the configured targets
    ///
    /// `output` is the forced output format, `None` to keep each frame's own.
    #[must_use]
    pub fn resolve(self, resolution: (u32, u32), fps: u32, output: Option<PixelFormat>) -> AdaptationPolicy {
        let capped = |(w, h): (u32, u32)| {
            (w.min(CONSTRAINED_RESOLUTION.0), h.min(CONSTRAINED_RESOLUTION.1))
        };
        let capped_fps = if fps == 0 { CONSTRAINED_FPS } else { fps.min(CONSTRAINED_FPS) };

        match self {
            Self::Auto | Self::Quality => AdaptationPolicy {
                resolution,
                fps,
                output_format: output,
                allow_hardware: true,
            },
            Self::Performance => AdaptationPolicy {
                resolution: capped(resolution),
                fps: capped_fps,
                output_format: output,
                allow_hardware: true,
            },
            Self::Compatibility => AdaptationPolicy {
                resolution: capped(resolution),
                fps: capped_fps,
                output_format: Some(PixelFormat::FullRangeYuv420),
                allow_hardware: false,
            },
        }
    }
}

impl std::fmt::Display for AdaptationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective targets after applying an [`AdaptationMode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptationPolicy {
    /// Output resolution box
    pub resolution: (u32, u32),
    /// Target delivery rate, 0 for unlimited
    pub fps: u32,
    /// Format produced for the cache, `None` to keep the arrival format
    pub output_format: Option<PixelFormat>,
    /// Whether the hardware converter may be used
    pub allow_hardware: bool,
}
