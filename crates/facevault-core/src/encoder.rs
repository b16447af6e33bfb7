//! Face embedding capability and its ONNX implementation.
//!
//! Computes 128-dimensional face encodings from aligned 112×112 RGB crops.
//! Any ONNX export with a `1×3×112×112` input and a 128-value output works
//! (MobileFaceNet and similar compact models).

use crate::alignment::{self, ALIGNED_SIZE};
use crate::types::{FaceEncoding, FaceRegion};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const ENCODER_MEAN: f32 = 127.5;
const ENCODER_STD: f32 = 127.5; // symmetric normalization to [-1, 1]

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("model file not found: {0}; place a 128-d encoder ONNX export in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Computes face encodings for detected regions.
///
/// The output is aligned by index with `regions`. A `None` slot marks a region
/// the embedder could not encode (for example, a box entirely off-image).
pub trait FaceEmbedder {
    fn compute_embeddings(
        &mut self,
        image: &RgbImage,
        regions: &[FaceRegion],
    ) -> Result<Vec<Option<FaceEncoding>>, EmbedderError>;
}

/// ONNX-backed 128-d face encoder.
pub struct OnnxEmbedder {
    session: Session,
    model_version: String,
}

impl OnnxEmbedder {
    /// Load the encoder model. The file stem is recorded as the model version.
    pub fn load(model_path: &str) -> Result<Self, EmbedderError> {
        let path = Path::new(model_path);
        if !path.exists() {
            return Err(EmbedderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded face encoder model"
        );

        let model_version = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            session,
            model_version,
        })
    }

    fn encode_chip(&mut self, chip: &RgbImage) -> Result<FaceEncoding, EmbedderError> {
        let input = preprocess(chip);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("encoding extraction: {e}")))?;

        let values = l2_normalize(raw);
        FaceEncoding::new(values, Some(self.model_version.clone()))
            .map_err(|e| EmbedderError::InferenceFailed(e.to_string()))
    }
}

impl FaceEmbedder for OnnxEmbedder {
    fn compute_embeddings(
        &mut self,
        image: &RgbImage,
        regions: &[FaceRegion],
    ) -> Result<Vec<Option<FaceEncoding>>, EmbedderError> {
        let mut encodings = Vec::with_capacity(regions.len());
        for region in regions {
            let Some(chip) = alignment::face_chip(image, region) else {
                tracing::debug!(?region, "region outside image; no encoding");
                encodings.push(None);
                continue;
            };
            encodings.push(Some(self.encode_chip(&chip)?));
        }
        Ok(encodings)
    }
}

/// Convert a 112×112 RGB crop into a normalized NCHW float tensor.
fn preprocess(chip: &RgbImage) -> Array4<f32> {
    let size = ALIGNED_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for (x, y, pixel) in chip.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        if x >= size || y >= size {
            continue;
        }
        for c in 0..3 {
            tensor[[0, c, y, x]] = (pixel[c] as f32 - ENCODER_MEAN) / ENCODER_STD;
        }
    }

    tensor
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_preprocess_output_shape() {
        let chip = RgbImage::new(ALIGNED_SIZE, ALIGNED_SIZE);
        let tensor = preprocess(&chip);
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
    }

    #[test]
    fn test_preprocess_normalization_per_channel() {
        let chip = RgbImage::from_pixel(ALIGNED_SIZE, ALIGNED_SIZE, Rgb([255, 0, 128]));
        let tensor = preprocess(&chip);
        assert!((tensor[[0, 0, 5, 5]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 5, 5]] + 1.0).abs() < 1e-6);
        let expected = (128.0 - ENCODER_MEAN) / ENCODER_STD;
        assert!((tensor[[0, 2, 5, 5]] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_unit_length() {
        let v = l2_normalize(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_untouched() {
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_load_missing_model() {
        let err = OnnxEmbedder::load("/nonexistent/face_encoder_128.onnx").err();
        assert!(matches!(err, Some(EmbedderError::ModelNotFound(_))));
    }
}
