//! Frame attachments
//!
//! Timing, color and orientation information travels with a pixel buffer.
//! The conversion engine extracts it before a transform and reapplies it to
//! the result so consumers observe the same timing and color semantics on
//! both sides of a conversion.

use std::time::Duration;

/// Color primaries of the source material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorPrimaries {
    /// SD video (BT.601)
    Bt601,
    /// HD video (BT.709)
    #[default]
    Bt709,
    /// Not signalled by the source
    Unspecified,
}

/// Orientation the consumer should apply when presenting the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// No rotation
    #[default]
    Up,
    /// Rotated 90 degrees clockwise
    Right,
    /// Rotated 180 degrees
    Down,
    /// Rotated 270 degrees clockwise
    Left,
}

impl Orientation {
    /// Map a transport rotation in degrees; non-right angles map to `Up`
    #[must_use]
    pub fn from_degrees(degrees: u32) -> Self {
        match degrees % 360 {
            90 => Self::Right,
            180 => Self::Down,
            270 => Self::Left,
            _ => Self::Up,
        }
    }
}

/// Presentation timing of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameTiming {
    /// Presentation timestamp
    pub pts: Duration,
    /// Frame duration, when the source signals one
    pub duration: Option<Duration>,
}

/// Attachment set carried alongside a pixel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameMetadata {
    /// Source color primaries
    pub color_primaries: ColorPrimaries,
    /// Presentation timing
    pub timing: FrameTiming,
    /// Presentation orientation
    pub orientation: Orientation,
}

impl FrameMetadata {
    /// Metadata for a frame with the given timestamp and defaults elsewhere
    #[must_use]
    pub fn at(pts: Duration) -> Self {
        Self {
            timing: FrameTiming { pts, duration: None },
            ..Self::default()
        }
    }

    /// Copy of this metadata with a new frame duration
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.timing.duration = Some(duration);
        self
    }
}
