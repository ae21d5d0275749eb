//! Pixel format detection
//!
//! The media transport hands frames over tagged with a native four-character
//! code. Only three layouts are understood by the conversion engine; anything
//! else is carried through as [`PixelFormat::Unknown`].

use std::fmt;

/// Build a big-endian four-character code
#[must_use]
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    ((code[0] as u32) << 24) | ((code[1] as u32) << 16) | ((code[2] as u32) << 8) | (code[3] as u32)
}

/// Native code for bi-planar 4:2:0, full range luma/chroma
pub const FOURCC_420F: u32 = fourcc(b"420f");

/// Native code for bi-planar 4:2:0, video (limited) range
pub const FOURCC_420V: u32 = fourcc(b"420v");

/// Native code for packed 32-bit BGRA
pub const FOURCC_BGRA: u32 = fourcc(b"BGRA");

const FORMAT_TABLE: [(u32, PixelFormat); 3] = [
    (FOURCC_420F, PixelFormat::FullRangeYuv420),
    (FOURCC_420V, PixelFormat::VideoRangeYuv420),
    (FOURCC_BGRA, PixelFormat::PackedBgra),
];

/// Pixel formats understood by the conversion engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// Unrecognized native format; passed through untouched
    #[default]
    Unknown,
    /// Bi-planar Y + interleaved CbCr, 0-255 sample range
    FullRangeYuv420,
    /// Bi-planar Y + interleaved CbCr, 16-235/240 sample range
    VideoRangeYuv420,
    /// Packed 8-bit B, G, R, A
    PackedBgra,
}

impl PixelFormat {
    /// Map a transport four-character code to a format
    #[must_use]
    pub fn from_fourcc(code: u32) -> Self {
        FORMAT_TABLE
            .iter()
            .find(|(c, _)| *c == code)
            .map_or(Self::Unknown, |(_, f)| *f)
    }

    /// Inverse of [`from_fourcc`](Self::from_fourcc)
    #[must_use]
    pub fn fourcc(self) -> Option<u32> {
        FORMAT_TABLE.iter().find(|(_, f)| *f == self).map(|(c, _)| *c)
    }

    /// Short name used in logs and status messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::FullRangeYuv420 => "420f",
            Self::VideoRangeYuv420 => "420v",
            Self::PackedBgra => "BGRA",
        }
    }

    /// Whether this is one of the bi-planar 4:2:0 layouts
    #[must_use]
    pub const fn is_yuv(self) -> bool {
        matches!(self, Self::FullRangeYuv420 | Self::VideoRangeYuv420)
    }

    /// Bytes needed to hold a frame of the given size
    ///
    /// `None` for `Unknown`, and for sizes that do not fit in `usize`.
    #[must_use]
    pub fn buffer_size(self, width: u32, height: u32) -> Option<usize> {
        let pixels = (width as usize).checked_mul(height as usize)?;
        match self {
            Self::Unknown => None,
            Self::PackedBgra => pixels.checked_mul(4),
            Self::FullRangeYuv420 | Self::VideoRangeYuv420 => pixels.checked_add(chroma_plane_size(width, height)?),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size of the interleaved CbCr plane of a 4:2:0 frame
pub(crate) fn chroma_plane_size(width: u32, height: u32) -> Option<usize> {
    let cw = (width as usize).div_ceil(2);
    let ch = (height as usize).div_ceil(2);
    cw.checked_mul(ch)?.checked_mul(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_table() {
        assert_eq!(PixelFormat::from_fourcc(FOURCC_420F), PixelFormat::FullRangeYuv420);
        assert_eq!(PixelFormat::from_fourcc(FOURCC_420V), PixelFormat::VideoRangeYuv420);
        assert_eq!(PixelFormat::from_fourcc(FOURCC_BGRA), PixelFormat::PackedBgra);
        assert_eq!(PixelFormat::from_fourcc(fourcc(b"y420")), PixelFormat::Unknown);
    }

    #[test]
    fn test_inverse_mapping() {
        for format in [
            PixelFormat::FullRangeYuv420,
            PixelFormat::VideoRangeYuv420,
            PixelFormat::PackedBgra,
        ] {
            let code = format.fourcc().expect("known format has a code");
            assert_eq!(PixelFormat::from_fourcc(code), format);
        }
        assert_eq!(PixelFormat::Unknown.fourcc(), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(PixelFormat::FullRangeYuv420.to_string(), "420f");
        assert_eq!(PixelFormat::PackedBgra.to_string(), "BGRA");
    }

    #[test]
    fn test_buffer_size() {
        assert_eq!(PixelFormat::PackedBgra.buffer_size(4, 2), Some(32));
        assert_eq!(PixelFormat::FullRangeYuv420.buffer_size(4, 2), Some(12));
        // Odd sizes round the chroma plane up
        assert_eq!(PixelFormat::VideoRangeYuv420.buffer_size(3, 3), Some(9 + 8));
        assert_eq!(PixelFormat::Unknown.buffer_size(4, 4), None);
    }

    #[test]
    fn test_buffer_size_overflow() {
        assert_eq!(PixelFormat::PackedBgra.buffer_size(u32::MAX, u32::MAX), None);
        assert_eq!(PixelFormat::FullRangeYuv420.buffer_size(u32::MAX, u32::MAX), None);
    }
}
