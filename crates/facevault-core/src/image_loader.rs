//! Image loading: decode any supported raster file into an RGB8 buffer.

use image::{ImageReader, RgbImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageLoadError {
    #[error("could not load image from {}: {source}", .path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode image {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },
}

/// Load an image from disk, normalized to red-green-blue channel order.
///
/// The format is guessed from file content, not the extension. Grayscale,
/// alpha and 16-bit sources are all converted to 8-bit RGB.
pub fn load_image(path: impl AsRef<Path>) -> Result<RgbImage, ImageLoadError> {
    let path = path.as_ref();

    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|source| ImageLoadError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;

    let decoded = reader.decode().map_err(|e| ImageLoadError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(ImageLoadError::Decode {
            path: path.to_path_buf(),
            reason: "image has zero width or height".into(),
        });
    }

    let rgb = decoded.to_rgb8();
    tracing::debug!(
        path = %path.display(),
        width = rgb.width(),
        height = rgb.height(),
        "image loaded"
    );
    Ok(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb};

    fn temp_path(ext: &str) -> PathBuf {
        std::env::temp_dir().join(format!("facevault-loader-{}.{ext}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_load_preserves_rgb_order() {
        let path = temp_path("png");
        let mut img = RgbImage::new(4, 3);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(3, 2, Rgb([0, 0, 255]));
        img.save(&path).unwrap();

        let loaded = load_image(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.dimensions(), (4, 3));
        assert_eq!(loaded.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(loaded.get_pixel(3, 2), &Rgb([0, 0, 255]));
    }

    #[test]
    fn test_load_grayscale_expands_to_rgb() {
        let path = temp_path("png");
        let mut img = GrayImage::new(2, 2);
        img.put_pixel(1, 1, Luma([77]));
        img.save(&path).unwrap();

        let loaded = load_image(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.get_pixel(1, 1), &Rgb([77, 77, 77]));
    }

    #[test]
    fn test_format_guessed_from_content() {
        // PNG bytes behind a misleading extension
        let png_path = temp_path("png");
        RgbImage::new(2, 2).save(&png_path).unwrap();
        let odd_path = temp_path("dat");
        std::fs::rename(&png_path, &odd_path).unwrap();

        let loaded = load_image(&odd_path);
        std::fs::remove_file(&odd_path).ok();
        assert!(loaded.is_ok());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = load_image(temp_path("jpg")).unwrap_err();
        assert!(matches!(err, ImageLoadError::NotFound { .. }), "got {err:?}");
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let path = temp_path("jpg");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let err = load_image(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, ImageLoadError::Decode { .. }), "got {err:?}");
    }
}
