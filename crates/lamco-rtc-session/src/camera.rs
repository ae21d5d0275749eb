//! Local camera profiles
//!
//! When the stream stands in for a local camera, the output should match what
//! that camera would natively produce. Each position has a default profile.

use lamco_rtc_frame::PixelFormat;

use crate::transport::MediaHints;

/// Physical camera position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraPosition {
    /// User-facing camera
    Front,
    /// World-facing camera
    Back,
}

/// Native output characteristics of a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraProfile {
    /// Native pixel format
    pub format: PixelFormat,
    /// Native resolution
    pub resolution: (u32, u32),
    /// Native frame rate
    pub fps: u32,
}

impl CameraProfile {
    /// Default profile for a camera position
    #[must_use]
    pub fn native(position: CameraPosition) -> Self {
        match position {
            CameraPosition::Front => Self {
                format: PixelFormat::FullRangeYuv420,
                resolution: (1280, 720),
                fps: 30,
            },
            CameraPosition::Back => Self {
                format: PixelFormat::FullRangeYuv420,
                resolution: (1920, 1080),
                fps: 30,
            },
        }
    }

    /// Transport hints matching this profile
    #[must_use]
    pub fn hints(&self) -> MediaHints {
        MediaHints::new(self.resolution.0, self.resolution.1, self.fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_profiles() {
        let front = CameraProfile::native(CameraPosition::Front);
        assert_eq!(front.resolution, (1280, 720));
        assert_eq!(front.hints(), MediaHints::new(1280, 720, 30));

        let back = CameraProfile::native(CameraPosition::Back);
        assert_eq!(back.format, PixelFormat::FullRangeYuv420);
        assert_eq!(back.resolution, (1920, 1080));
    }
}
