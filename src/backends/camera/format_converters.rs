// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion utilities
//!
//! The MJPEG encoder needs packed RGB input and the test pattern source
//! needs to go the other way. All conversions use BT.601 coefficients,
//! full range, and honour the row stride of the source buffer.

use super::types::{PixelFormat, StreamInfo};

/// Convert YUV (BT.601) to RGB
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

    (r, g, b)
}

/// Convert RGB to YUV (BT.601)
pub fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);

    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = -0.168736 * r - 0.331264 * g + 0.5 * b + 128.0;
    let v = 0.5 * r - 0.418688 * g - 0.081312 * b + 128.0;

    (
        y.round().clamp(0.0, 255.0) as u8,
        u.round().clamp(0.0, 255.0) as u8,
        v.round().clamp(0.0, 255.0) as u8,
    )
}

/// Convert a frame to tightly packed RGB24
///
/// Returns `None` for formats that have no RGB interpretation here
/// (MJPEG, raw Bayer), for empty geometry, or when the buffer or stride is
/// too small for the stream geometry. Odd widths and heights are handled:
/// chroma is subsampled with rounding up, so the last column and row share
/// the final chroma sample.
pub fn frame_to_rgb(data: &[u8], info: &StreamInfo) -> Option<Vec<u8>> {
    let w = info.width as usize;
    let h = info.height as usize;
    if w == 0 || h == 0 {
        return None;
    }
    let stride = info.stride as usize;
    let chroma_w = w.div_ceil(2);
    let chroma_h = h.div_ceil(2);

    let mut rgb = Vec::with_capacity(w * h * 3);

    match info.pixel_format {
        PixelFormat::YUYV | PixelFormat::UYVY => {
            // A row holds whole macropixels, even when the width is odd
            let row_bytes = chroma_w * 4;
            let stride = if stride == 0 { row_bytes } else { stride };
            if stride < w * 2 || data.len() < stride * (h - 1) + w * 2 {
                return None;
            }
            let yuyv = info.pixel_format == PixelFormat::YUYV;
            for row in 0..h {
                let start = row * stride;
                let end = (start + row_bytes.min(stride)).min(data.len());
                let line = &data[start..end];
                // Two pixels share one chroma pair
                for col in 0..w {
                    let base = (col / 2) * 4;
                    let byte = |i: usize| line.get(base + i).copied().unwrap_or(128);
                    let (y0, u, y1, v) = if yuyv {
                        (byte(0), byte(1), byte(2), byte(3))
                    } else {
                        (byte(1), byte(0), byte(3), byte(2))
                    };
                    let luma = if col % 2 == 0 { y0 } else { y1 };
                    push_rgb(&mut rgb, yuv_to_rgb(luma, u, v));
                }
            }
        }
        PixelFormat::NV12 => {
            let stride = if stride == 0 { w } else { stride };
            let uv_row_bytes = chroma_w * 2;
            let uv_offset = stride * h;
            if stride < uv_row_bytes.max(w)
                || data.len() < uv_offset + stride * (chroma_h - 1) + uv_row_bytes
            {
                return None;
            }
            for row in 0..h {
                for col in 0..w {
                    let luma = data[row * stride + col];
                    let uv_idx = uv_offset + (row / 2) * stride + (col / 2) * 2;
                    push_rgb(&mut rgb, yuv_to_rgb(luma, data[uv_idx], data[uv_idx + 1]));
                }
            }
        }
        PixelFormat::YUV420 => {
            let stride = if stride == 0 { w } else { stride };
            let chroma_stride = stride.div_ceil(2);
            let y_size = stride * h;
            let chroma_size = chroma_stride * chroma_h;
            if stride < w || data.len() < y_size + 2 * chroma_size {
                return None;
            }
            let (u_plane, v_plane) = data[y_size..].split_at(chroma_size);
            for row in 0..h {
                for col in 0..w {
                    let luma = data[row * stride + col];
                    let idx = (row / 2) * chroma_stride + col / 2;
                    push_rgb(&mut rgb, yuv_to_rgb(luma, u_plane[idx], v_plane[idx]));
                }
            }
        }
        PixelFormat::RGB24 => {
            let stride = if stride == 0 { w * 3 } else { stride };
            if stride < w * 3 || data.len() < stride * (h - 1) + w * 3 {
                return None;
            }
            for row in 0..h {
                rgb.extend_from_slice(&data[row * stride..row * stride + w * 3]);
            }
        }
        PixelFormat::Gray8 => {
            let stride = if stride == 0 { w } else { stride };
            if stride < w || data.len() < stride * (h - 1) + w {
                return None;
            }
            for row in 0..h {
                for &v in &data[row * stride..row * stride + w] {
                    push_rgb(&mut rgb, (v, v, v));
                }
            }
        }
        PixelFormat::MJPEG | PixelFormat::Other(_) => return None,
    }

    (rgb.len() == w * h * 3).then_some(rgb)
}

fn push_rgb(out: &mut Vec<u8>, (r, g, b): (u8, u8, u8)) {
    out.push(r);
    out.push(g);
    out.push(b);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::ColourSpace;

    fn info(width: u32, height: u32, stride: u32, pixel_format: PixelFormat) -> StreamInfo {
        StreamInfo {
            width,
            height,
            stride,
            pixel_format,
            colour_space: ColourSpace::Jpeg,
        }
    }

    #[test]
    fn test_yuv_round_trip_primaries() {
        for (r, g, b) in [(255, 0, 0), (0, 255, 0), (0, 0, 255), (128, 128, 128)] {
            let (y, u, v) = rgb_to_yuv(r, g, b);
            let (r2, g2, b2) = yuv_to_rgb(y, u, v);
            assert!((r as i32 - r2 as i32).abs() <= 2);
            assert!((g as i32 - g2 as i32).abs() <= 2);
            assert!((b as i32 - b2 as i32).abs() <= 2);
        }
    }

    #[test]
    fn test_yuyv_respects_stride() {
        // 2x2 grey frame, rows padded to 8 bytes
        let data = [
            128, 128, 128, 128, 0xAA, 0xAA, 0xAA, 0xAA, //
            128, 128, 128, 128, 0xAA, 0xAA, 0xAA, 0xAA,
        ];
        let rgb = frame_to_rgb(&data, &info(2, 2, 8, PixelFormat::YUYV)).unwrap();
        assert_eq!(rgb.len(), 2 * 2 * 3);
        assert!(rgb.iter().all(|&c| c == 128));
    }

    #[test]
    fn test_gray_expands_to_rgb() {
        let rgb = frame_to_rgb(&[0, 255], &info(2, 1, 2, PixelFormat::Gray8)).unwrap();
        assert_eq!(rgb, vec![0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        assert!(frame_to_rgb(&[0u8; 10], &info(4, 4, 8, PixelFormat::YUYV)).is_none());
        assert!(frame_to_rgb(&[0u8; 10], &info(4, 4, 0, PixelFormat::NV12)).is_none());
    }

    #[test]
    fn test_mjpeg_has_no_rgb_view() {
        assert!(frame_to_rgb(&[0xFF, 0xD8], &info(1, 1, 0, PixelFormat::MJPEG)).is_none());
    }

    #[test]
    fn test_odd_width_yuyv_covers_every_pixel() {
        // 3x2, each row padded to two macropixels
        let rgb = frame_to_rgb(&[128; 16], &info(3, 2, 8, PixelFormat::YUYV)).unwrap();
        assert_eq!(rgb.len(), 3 * 2 * 3);

        // Tightly packed rows end mid-macropixel
        let rgb = frame_to_rgb(&[128; 12], &info(3, 2, 6, PixelFormat::UYVY)).unwrap();
        assert_eq!(rgb.len(), 3 * 2 * 3);
    }

    #[test]
    fn test_odd_geometry_planar_formats() {
        // I420 3x3: 9 luma, 2x2 U, 2x2 V
        let rgb = frame_to_rgb(&[128; 17], &info(3, 3, 3, PixelFormat::YUV420)).unwrap();
        assert_eq!(rgb.len(), 3 * 3 * 3);

        // NV12 3x3 with stride 4: 12 luma, two interleaved rows of 4
        let rgb = frame_to_rgb(&[128; 20], &info(3, 3, 4, PixelFormat::NV12)).unwrap();
        assert_eq!(rgb.len(), 3 * 3 * 3);
    }

    #[test]
    fn test_odd_geometry_short_buffers_are_rejected() {
        assert!(frame_to_rgb(&[128; 8], &info(3, 2, 3, PixelFormat::YUV420)).is_none());
        // NV12 odd width with stride == width cannot hold the last chroma pair
        assert!(frame_to_rgb(&[128; 12], &info(3, 3, 3, PixelFormat::NV12)).is_none());
        assert!(frame_to_rgb(&[128; 16], &info(4, 2, 4, PixelFormat::YUYV)).is_none());
        assert!(frame_to_rgb(&[], &info(0, 0, 0, PixelFormat::Gray8)).is_none());
    }
}
