//! Frame type, pixel conversion (YUYV/GREY/Y16 to RGB) and dark-frame detection.

use image::{Rgb, RgbImage};

/// A captured camera frame, already converted to RGB.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub sequence: u32,
    pub is_dark: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

fn check_len(buf: &[u8], expected: usize) -> Result<(), FrameError> {
    if buf.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

/// BT.601 full-range YCbCr to RGB.
fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> Rgb<u8> {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    let clamp = |c: f32| c.round().clamp(0.0, 255.0) as u8;
    Rgb([
        clamp(y + 1.402 * v),
        clamp(y - 0.344_136 * u - 0.714_136 * v),
        clamp(y + 1.772 * u),
    ])
}

/// Convert packed YUYV (4:2:2) to RGB.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share the
/// chroma pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    check_len(yuyv, (width * height * 2) as usize)?;

    let mut image = RgbImage::new(width, height);
    for (pair_idx, chunk) in yuyv.chunks_exact(4).take((width * height / 2) as usize).enumerate() {
        let [y0, u, y1, v] = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let px = (pair_idx * 2) as u32;
        image.put_pixel(px % width, px / width, ycbcr_to_rgb(y0, u, v));
        image.put_pixel((px + 1) % width, (px + 1) / width, ycbcr_to_rgb(y1, u, v));
    }
    Ok(image)
}

/// Convert 8-bit grayscale (native IR output) to RGB by replicating the channel.
pub fn grey_to_rgb(grey: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    check_len(grey, (width * height) as usize)?;
    Ok(RgbImage::from_fn(width, height, |x, y| {
        let g = grey[(y * width + x) as usize];
        Rgb([g, g, g])
    }))
}

/// Convert 16-bit little-endian grayscale to RGB, keeping the high byte.
pub fn y16_to_rgb(buf: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    check_len(buf, (width * height * 2) as usize)?;
    Ok(RgbImage::from_fn(width, height, |x, y| {
        let idx = ((y * width + x) * 2) as usize;
        let g = u16::from_le_bytes([buf[idx], buf[idx + 1]]) >> 8;
        Rgb([g as u8; 3])
    }))
}

/// Check whether more than `threshold_pct` of pixels have luma below 32.
pub fn is_dark_frame(image: &RgbImage, threshold_pct: f32) -> bool {
    let total = image.width() as usize * image.height() as usize;
    if total == 0 {
        return true;
    }
    let dark_count = image
        .pixels()
        .filter(|p| {
            let luma = 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32;
            luma < 32.0
        })
        .count();
    (dark_count as f32 / total as f32) > threshold_pct
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_neutral_chroma_is_grey() {
        // 2x1 image: [Y0=100, U=128, Y1=200, V=128]
        let rgb = yuyv_to_rgb(&[100, 128, 200, 128], 2, 1).unwrap();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([100, 100, 100]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([200, 200, 200]));
    }

    #[test]
    fn test_yuyv_red_chroma() {
        // Strong V (Cr) pushes red up and green down
        let rgb = yuyv_to_rgb(&[100, 128, 100, 228], 2, 1).unwrap();
        let p = rgb.get_pixel(0, 0);
        assert!(p[0] > 200 && p[1] < 50, "got {p:?}");
        assert_eq!(p[2], 100);
    }

    #[test]
    fn test_yuyv_wraps_rows() {
        // 2x2 image = 4 pixels, 8 YUYV bytes
        let rgb = yuyv_to_rgb(&[10, 128, 20, 128, 30, 128, 40, 128], 2, 2).unwrap();
        assert_eq!(rgb.get_pixel(0, 1), &Rgb([30, 30, 30]));
        assert_eq!(rgb.get_pixel(1, 1), &Rgb([40, 40, 40]));
    }

    #[test]
    fn test_yuyv_invalid_length() {
        assert!(yuyv_to_rgb(&[100, 128], 2, 1).is_err());
    }

    #[test]
    fn test_grey_replicates_channel() {
        let rgb = grey_to_rgb(&[7, 9], 2, 1).unwrap();
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([9, 9, 9]));
        assert!(grey_to_rgb(&[1], 2, 1).is_err());
    }

    #[test]
    fn test_y16_keeps_high_byte() {
        let rgb = y16_to_rgb(&[0xff, 0x80, 0x00, 0x10], 2, 1).unwrap();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([0x80; 3]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([0x10; 3]));
    }

    #[test]
    fn test_dark_frame_all_black() {
        assert!(is_dark_frame(&RgbImage::new(10, 10), 0.95));
    }

    #[test]
    fn test_dark_frame_normal() {
        assert!(!is_dark_frame(&RgbImage::from_pixel(10, 10, Rgb([128, 128, 128])), 0.95));
    }

    #[test]
    fn test_dark_frame_empty() {
        assert!(is_dark_frame(&RgbImage::new(0, 0), 0.95));
    }

    #[test]
    fn test_dark_frame_borderline_bright() {
        // 94% dark, 6% bright → should NOT be dark
        let image = RgbImage::from_fn(100, 10, |x, _| {
            if x < 94 {
                Rgb([10, 10, 10])
            } else {
                Rgb([128, 128, 128])
            }
        });
        assert!(!is_dark_frame(&image, 0.95));
    }
}
