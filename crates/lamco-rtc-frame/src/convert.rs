//! Software color conversion and scaling
//!
//! Reference implementations for every conversion pair the engine supports
//! between the bi-planar 4:2:0 layouts (full and video range) and packed
//! BGRA, plus plane resampling. These are used when no hardware context is
//! available or the hardware path rejects a pair.
//!
//! # Color Matrix
//!
//! All conversions use BT.601 coefficients in 8.8 fixed point, matching what
//! camera pipelines emit for SD and most HD capture.
//!
//! # Performance
//!
//! Correctness first. A hardware converter should be registered with the
//! engine for high frame rates; see
//! [`HardwareConverter`](crate::hardware::HardwareConverter).

use crate::buffer::PixelBuffer;
use crate::error::{FrameError, Result};
use crate::format::PixelFormat;

/// Resampling filter used by [`scale`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleFilter {
    /// Pick the closest source sample
    Nearest,
    /// Interpolate the four surrounding samples
    #[default]
    Bilinear,
}

/// Whether the software path can produce `to` from `from`
#[must_use]
pub fn supports(from: PixelFormat, to: PixelFormat) -> bool {
    from != PixelFormat::Unknown && to != PixelFormat::Unknown
}

/// Convert a buffer to another format, keeping geometry and metadata
///
/// Same-format requests return a copy. The result is untracked; callers that
/// account for buffers attach a ticket themselves.
pub fn convert(src: &PixelBuffer, to: PixelFormat) -> Result<PixelBuffer> {
    let from = src.format();
    if !supports(from, to) {
        return Err(FrameError::unsupported(from, to));
    }

    let (w, h) = src.dimensions();
    if to.buffer_size(w, h).is_none() {
        return Err(FrameError::invalid_buffer(format!("{to} {w}x{h} is too large")));
    }
    let data = match (from, to) {
        _ if from == to => src.data().to_vec(),
        (PixelFormat::FullRangeYuv420 | PixelFormat::VideoRangeYuv420, PixelFormat::PackedBgra) => {
            yuv420_to_bgra(src.luma_plane(), src.chroma_plane(), w, h, from == PixelFormat::FullRangeYuv420)
        }
        (PixelFormat::PackedBgra, PixelFormat::FullRangeYuv420 | PixelFormat::VideoRangeYuv420) => {
            bgra_to_yuv420(src.data(), w, h, to == PixelFormat::FullRangeYuv420)
        }
        (PixelFormat::FullRangeYuv420, PixelFormat::VideoRangeYuv420) => {
            remap_range(src.luma_plane(), src.chroma_plane(), true)
        }
        (PixelFormat::VideoRangeYuv420, PixelFormat::FullRangeYuv420) => {
            remap_range(src.luma_plane(), src.chroma_plane(), false)
        }
        _ => return Err(FrameError::unsupported(from, to)),
    };

    Ok(PixelBuffer::new(to, w, h, data)?.with_metadata(*src.metadata()))
}

/// Resize a buffer to exactly `width` x `height`
///
/// Aspect handling and up-scale limits are decided by the caller; see
/// [`fit_dimensions`].
pub fn scale(src: &PixelBuffer, width: u32, height: u32, filter: ScaleFilter) -> Result<PixelBuffer> {
    let format = src.format();
    if format == PixelFormat::Unknown {
        return Err(FrameError::unsupported(format, format));
    }
    if width == 0 || height == 0 || format.buffer_size(width, height).is_none() {
        return Err(FrameError::InvalidParameter(format!("scale target {width}x{height}")));
    }
    if src.dimensions() == (width, height) {
        return Ok(PixelBuffer::new(format, width, height, src.data().to_vec())?.with_metadata(*src.metadata()));
    }

    let (sw, sh) = src.dimensions();
    let data = if format.is_yuv() {
        let mut out = resample_plane(src.luma_plane(), sw, sh, 1, width, height, filter);
        out.extend(resample_plane(
            src.chroma_plane(),
            sw.div_ceil(2),
            sh.div_ceil(2),
            2,
            width.div_ceil(2),
            height.div_ceil(2),
            filter,
        ));
        out
    } else {
        resample_plane(src.data(), sw, sh, 4, width, height, filter)
    };

    Ok(PixelBuffer::new(format, width, height, data)?.with_metadata(*src.metadata()))
}

/// Output size for a scale step
///
/// With `preserve_aspect` the source is fitted inside the target box;
/// otherwise the target is used as-is (a distorting resize). Unless
/// `allow_upscale` is set neither dimension grows beyond the source.
#[must_use]
pub fn fit_dimensions(
    source: (u32, u32),
    target: (u32, u32),
    preserve_aspect: bool,
    allow_upscale: bool,
) -> (u32, u32) {
    let (sw, sh) = source;
    let (tw, th) = target;
    if sw == 0 || sh == 0 || tw == 0 || th == 0 {
        return source;
    }

    if preserve_aspect {
        let mut factor = (f64::from(tw) / f64::from(sw)).min(f64::from(th) / f64::from(sh));
        if !allow_upscale {
            factor = factor.min(1.0);
        }
        let w = (f64::from(sw) * factor).round().max(1.0) as u32;
        let h = (f64::from(sh) * factor).round().max(1.0) as u32;
        (w, h)
    } else if allow_upscale {
        (tw, th)
    } else {
        (tw.min(sw), th.min(sh))
    }
}

/// Round dimensions down to even values (4:2:0 chroma siting), minimum 2
///
/// The result never exceeds `source`. A source dimension of 1 has no even
/// value below it and is kept as-is.
#[must_use]
pub fn align_even(dimensions: (u32, u32), source: (u32, u32)) -> (u32, u32) {
    let even = |v: u32, limit: u32| {
        let aligned = (v & !1).max(2);
        if aligned <= limit {
            aligned
        } else {
            v.min(limit)
        }
    };
    (even(dimensions.0, source.0), even(dimensions.1, source.1))
}

fn yuv420_to_bgra(luma: &[u8], chroma: &[u8], width: u32, height: u32, full_range: bool) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let cw = w.div_ceil(2);

    let mut dst = vec![0u8; w * h * 4];
    for y in 0..h {
        for x in 0..w {
            let c_idx = ((y / 2) * cw + x / 2) * 2;
            let (r, g, b) = yuv_to_rgb(
                i32::from(luma[y * w + x]),
                i32::from(chroma[c_idx]),
                i32::from(chroma[c_idx + 1]),
                full_range,
            );

            let dst_idx = (y * w + x) * 4;
            dst[dst_idx] = b;
            dst[dst_idx + 1] = g;
            dst[dst_idx + 2] = r;
            dst[dst_idx + 3] = 255;
        }
    }
    dst
}

fn bgra_to_yuv420(src: &[u8], width: u32, height: u32, full_range: bool) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let cw = w.div_ceil(2);
    let ch = h.div_ceil(2);

    let mut dst = vec![0u8; w * h + cw * ch * 2];
    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) * 4;
            let (b, g, r) = (i32::from(src[i]), i32::from(src[i + 1]), i32::from(src[i + 2]));
            dst[y * w + x] = rgb_to_luma(r, g, b, full_range);
        }
    }

    // Average each 2x2 block (or the part of it inside the frame) for chroma
    let chroma = &mut dst[w * h..];
    for cy in 0..ch {
        for cx in 0..cw {
            let (mut r, mut g, mut b, mut n) = (0i32, 0i32, 0i32, 0i32);
            for y in (cy * 2)..((cy * 2 + 2).min(h)) {
                for x in (cx * 2)..((cx * 2 + 2).min(w)) {
                    let i = (y * w + x) * 4;
                    b += i32::from(src[i]);
                    g += i32::from(src[i + 1]);
                    r += i32::from(src[i + 2]);
                    n += 1;
                }
            }
            let (u, v) = rgb_to_chroma(r / n, g / n, b / n, full_range);
            let c_idx = (cy * cw + cx) * 2;
            chroma[c_idx] = u;
            chroma[c_idx + 1] = v;
        }
    }
    dst
}

fn remap_range(luma: &[u8], chroma: &[u8], full_to_video: bool) -> Vec<u8> {
    let mut dst = Vec::with_capacity(luma.len() + chroma.len());
    if full_to_video {
        dst.extend(luma.iter().map(|&y| (i32::from(y) * 219 / 255 + 16) as u8));
        dst.extend(chroma.iter().map(|&c| ((i32::from(c) - 128) * 224 / 255 + 128) as u8));
    } else {
        dst.extend(luma.iter().map(|&y| clamp_u8((i32::from(y) - 16) * 255 / 219)));
        dst.extend(chroma.iter().map(|&c| clamp_u8((i32::from(c) - 128) * 255 / 224 + 128)));
    }
    dst
}

/// Convert single YUV sample to RGB
///
/// Video range (BT.601):
/// R = 1.164(Y-16) + 1.596(V-128)
/// G = 1.164(Y-16) - 0.813(V-128) - 0.391(U-128)
/// B = 1.164(Y-16) + 2.018(U-128)
///
/// Full range drops the luma offset and uses 1.402 / 0.344 / 0.714 / 1.772.
#[inline]
fn yuv_to_rgb(y: i32, u: i32, v: i32, full_range: bool) -> (u8, u8, u8) {
    let u = u - 128;
    let v = v - 128;

    let (r, g, b) = if full_range {
        let y = y << 8;
        (y + 359 * v + 128, y - 88 * u - 183 * v + 128, y + 454 * u + 128)
    } else {
        let y = 298 * (y - 16);
        (y + 409 * v + 128, y - 100 * u - 208 * v + 128, y + 516 * u + 128)
    };

    (clamp_u8(r >> 8), clamp_u8(g >> 8), clamp_u8(b >> 8))
}

#[inline]
fn rgb_to_luma(r: i32, g: i32, b: i32, full_range: bool) -> u8 {
    if full_range {
        clamp_u8((77 * r + 150 * g + 29 * b + 128) >> 8)
    } else {
        clamp_u8(((66 * r + 129 * g + 25 * b + 128) >> 8) + 16)
    }
}

#[inline]
fn rgb_to_chroma(r: i32, g: i32, b: i32, full_range: bool) -> (u8, u8) {
    if full_range {
        (
            clamp_u8(((-43 * r - 85 * g + 128 * b + 128) >> 8) + 128),
            clamp_u8(((128 * r - 107 * g - 21 * b + 128) >> 8) + 128),
        )
    } else {
        (
            clamp_u8(((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128),
            clamp_u8(((112 * r - 94 * g - 18 * b + 128) >> 8) + 128),
        )
    }
}

#[inline]
fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

fn resample_plane(
    src: &[u8],
    sw: u32,
    sh: u32,
    channels: usize,
    dw: u32,
    dh: u32,
    filter: ScaleFilter,
) -> Vec<u8> {
    let (sw, sh, dw, dh) = (sw as usize, sh as usize, dw as usize, dh as usize);
    let mut dst = vec![0u8; dw * dh * channels];
    let x_ratio = sw as f32 / dw as f32;
    let y_ratio = sh as f32 / dh as f32;

    for y in 0..dh {
        for x in 0..dw {
            let out = (y * dw + x) * channels;
            match filter {
                ScaleFilter::Nearest => {
                    let sx = ((x as f32 * x_ratio) as usize).min(sw - 1);
                    let sy = ((y as f32 * y_ratio) as usize).min(sh - 1);
                    let i = (sy * sw + sx) * channels;
                    dst[out..out + channels].copy_from_slice(&src[i..i + channels]);
                }
                ScaleFilter::Bilinear => {
                    // Sample at pixel centers
                    let fx = ((x as f32 + 0.5) * x_ratio - 0.5).max(0.0);
                    let fy = ((y as f32 + 0.5) * y_ratio - 0.5).max(0.0);
                    let x0 = (fx as usize).min(sw - 1);
                    let y0 = (fy as usize).min(sh - 1);
                    let x1 = (x0 + 1).min(sw - 1);
                    let y1 = (y0 + 1).min(sh - 1);
                    let ax = fx - x0 as f32;
                    let ay = fy - y0 as f32;

                    for c in 0..channels {
                        let p = |px: usize, py: usize| f32::from(src[(py * sw + px) * channels + c]);
                        let top = p(x0, y0) * (1.0 - ax) + p(x1, y0) * ax;
                        let bottom = p(x0, y1) * (1.0 - ax) + p(x1, y1) * ax;
                        dst[out + c] = (top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8;
                    }
                }
            }
        }
    }
    dst
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::format::chroma_plane_size;
    use crate::metadata::{FrameMetadata, Orientation};

    fn nv12(w: u32, h: u32, y: u8, full: bool) -> PixelBuffer {
        let format = if full {
            PixelFormat::FullRangeYuv420
        } else {
            PixelFormat::VideoRangeYuv420
        };
        let mut data = vec![y; (w * h) as usize];
        data.extend(vec![128; chroma_plane_size(w, h).expect("chroma size")]);
        PixelBuffer::new(format, w, h, data).expect("nv12")
    }

    #[test]
    fn test_yuv_to_rgb() {
        // Black and white in video range
        assert_eq!(yuv_to_rgb(16, 128, 128, false), (0, 0, 0));
        let (r, g, b) = yuv_to_rgb(235, 128, 128, false);
        assert!(r > 250 && g > 250 && b > 250);

        // Full range spans the whole byte
        assert_eq!(yuv_to_rgb(0, 128, 128, true), (0, 0, 0));
        assert_eq!(yuv_to_rgb(255, 128, 128, true), (255, 255, 255));
    }

    #[test]
    fn test_video_range_to_bgra() {
        let src = nv12(2, 2, 16, false);
        let out = convert(&src, PixelFormat::PackedBgra).expect("convert");

        assert_eq!(out.format(), PixelFormat::PackedBgra);
        assert_eq!(out.data().len(), 16);
        assert!(out.data()[0] < 5 && out.data()[1] < 5 && out.data()[2] < 5);
        assert_eq!(out.data()[3], 255);
    }

    #[test]
    fn test_bgra_to_full_range() {
        // Two white pixels, two black pixels
        let src = PixelBuffer::new(
            PixelFormat::PackedBgra,
            2,
            2,
            vec![255, 255, 255, 255, 255, 255, 255, 255, 0, 0, 0, 255, 0, 0, 0, 255],
        )
        .expect("bgra");
        let out = convert(&src, PixelFormat::FullRangeYuv420).expect("convert");

        assert_eq!(out.luma_plane(), &[255, 255, 0, 0]);
        // Neutral gray averages keep chroma centered
        assert_eq!(out.chroma_plane(), &[128, 128]);
    }

    #[test]
    fn test_range_remap() {
        let full = nv12(2, 2, 255, true);
        let video = convert(&full, PixelFormat::VideoRangeYuv420).expect("convert");
        assert_eq!(video.luma_plane()[0], 235);

        let back = convert(&video, PixelFormat::FullRangeYuv420).expect("convert");
        assert_eq!(back.luma_plane()[0], 255);
    }

    #[test]
    fn test_odd_dimensions() {
        let src = PixelBuffer::new(PixelFormat::PackedBgra, 3, 3, vec![128; 36]).expect("bgra");
        let yuv = convert(&src, PixelFormat::VideoRangeYuv420).expect("convert");
        assert_eq!(yuv.data().len(), 9 + 8);
        let back = convert(&yuv, PixelFormat::PackedBgra).expect("convert");
        assert_eq!(back.dimensions(), (3, 3));
    }

    #[test]
    fn test_round_trip_preserves_timing_and_geometry() {
        let meta = FrameMetadata {
            orientation: Orientation::Left,
            ..FrameMetadata::at(Duration::from_micros(123_456))
        };
        let src = nv12(6, 4, 90, true).with_metadata(meta);

        let bgra = convert(&src, PixelFormat::PackedBgra).expect("to bgra");
        let back = convert(&bgra, PixelFormat::FullRangeYuv420).expect("to yuv");

        assert_eq!(back.dimensions(), src.dimensions());
        assert_eq!(back.metadata(), src.metadata());
        assert_eq!(back.metadata().timing.pts, Duration::from_micros(123_456));
    }

    #[test]
    fn test_unknown_is_unsupported() {
        let src = PixelBuffer::new(PixelFormat::Unknown, 2, 2, vec![1, 2, 3]).expect("unknown");
        let err = convert(&src, PixelFormat::PackedBgra).expect_err("unknown source");
        assert!(matches!(err, FrameError::ConversionUnsupported { .. }));
        assert!(scale(&src, 1, 1, ScaleFilter::Nearest).is_err());
    }

    #[test]
    fn test_scale_bgra() {
        let src = PixelBuffer::new(PixelFormat::PackedBgra, 4, 4, vec![200; 64]).expect("bgra");
        for filter in [ScaleFilter::Nearest, ScaleFilter::Bilinear] {
            let out = scale(&src, 2, 2, filter).expect("scale");
            assert_eq!(out.dimensions(), (2, 2));
            assert!(out.data().iter().all(|&b| b == 200));
        }
    }

    #[test]
    fn test_scale_yuv_planes() {
        let src = nv12(8, 4, 50, false).with_metadata(FrameMetadata::at(Duration::from_millis(5)));
        let out = scale(&src, 4, 2, ScaleFilter::Bilinear).expect("scale");
        assert_eq!(out.luma_plane().len(), 8);
        assert_eq!(out.chroma_plane().len(), 4);
        assert_eq!(out.metadata().timing.pts, Duration::from_millis(5));
    }

    #[test]
    fn test_fit_dimensions() {
        // Downscale keeps 16:9
        assert_eq!(fit_dimensions((1920, 1080), (1280, 1280), true, false), (1280, 720));
        // No upscale without request
        assert_eq!(fit_dimensions((640, 360), (1920, 1080), true, false), (640, 360));
        assert_eq!(fit_dimensions((640, 360), (1920, 1080), true, true), (1920, 1080));
        // Distorting resize, clamped to source
        assert_eq!(fit_dimensions((640, 480), (800, 200), false, false), (640, 200));
        assert_eq!(fit_dimensions((640, 480), (800, 200), false, true), (800, 200));
    }

    #[test]
    fn test_align_even() {
        assert_eq!(align_even((641, 361), (1280, 720)), (640, 360));
        assert_eq!(align_even((1, 1), (4, 4)), (2, 2));
    }

    #[test]
    fn test_align_even_stays_within_source() {
        assert_eq!(align_even((2, 1), (3, 1)), (2, 1));
        assert_eq!(align_even((1, 1), (1, 1)), (1, 1));
        assert_eq!(align_even((3, 3), (3, 3)), (2, 2));
    }

    #[test]
    fn test_scale_rejects_oversized_target() {
        let src = PixelBuffer::new(PixelFormat::PackedBgra, 2, 2, vec![0; 16]).expect("bgra");
        let err = scale(&src, u32::MAX, u32::MAX, ScaleFilter::Nearest).expect_err("too large");
        assert!(matches!(err, FrameError::InvalidParameter(_)));
    }
}
