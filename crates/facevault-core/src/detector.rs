//! Face detection capability and its SCRFD implementation via ONNX Runtime.
//!
//! SCRFD (Sample and Computation Redistribution for Efficient Face Detection)
//! is decoded with 3-stride anchor-free decoding and NMS post-processing.
//! The detection mode picks the letterbox size: a smaller input is faster on
//! CPU at the cost of missing small faces.

use crate::types::FaceRegion;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const SCRFD_FAST_INPUT_SIZE: usize = 320;
const SCRFD_ACCURATE_INPUT_SIZE: usize = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}; place an SCRFD ONNX export in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Speed/accuracy trade-off for a detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionMode {
    /// CPU-friendly pass on a downscaled image.
    #[default]
    Fast,
    /// Full-resolution pass; finds smaller faces, roughly 4x the cost.
    Accurate,
}

impl DetectionMode {
    fn input_size(self) -> usize {
        match self {
            DetectionMode::Fast => SCRFD_FAST_INPUT_SIZE,
            DetectionMode::Accurate => SCRFD_ACCURATE_INPUT_SIZE,
        }
    }
}

/// Locates faces in an RGB image.
///
/// Implementations define the order of the returned regions; callers that
/// need a single face take the first one.
pub trait FaceDetector {
    fn detect_regions(
        &mut self,
        image: &RgbImage,
        mode: DetectionMode,
    ) -> Result<Vec<FaceRegion>, DetectorError>;
}

/// Mapping from letterboxed model space back to original image space.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(width: u32, height: u32, input_size: usize) -> Self {
        let scale = (input_size as f32 / width as f32).min(input_size as f32 / height as f32);
        let new_w = (width as f32 * scale).round();
        let new_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((input_size as f32 - new_w) / 2.0).floor(),
            pad_y: ((input_size as f32 - new_h) / 2.0).floor(),
        }
    }

    fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Output tensor indices for one stride: (score_idx, bbox_idx, kps_idx).
type StrideOutputIndices = (usize, usize, usize);

/// Raw SCRFD outputs for a single stride level.
struct StrideOutputs<'a> {
    stride: usize,
    scores: &'a [f32],
    bboxes: &'a [f32],
    kps: &'a [f32],
}

/// SCRFD-based face detector. Regions are returned sorted by confidence.
pub struct ScrfdDetector {
    session: Session,
    /// Per-stride output indices [(score, bbox, kps)] for strides [8, 16, 32].
    stride_indices: [StrideOutputIndices; 3],
}

impl ScrfdDetector {
    /// Load an SCRFD ONNX model. The export must accept a dynamic input size.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        if output_names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires 9 outputs (3 strides × score/bbox/kps), got {}",
                output_names.len()
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            stride_indices,
        })
    }
}

impl FaceDetector for ScrfdDetector {
    fn detect_regions(
        &mut self,
        image: &RgbImage,
        mode: DetectionMode,
    ) -> Result<Vec<FaceRegion>, DetectorError> {
        let input_size = mode.input_size();
        let (input, letterbox) = preprocess(image, input_size);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (stride_pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx, kps_idx) = self.stride_indices[stride_pos];
            let extract = |idx: usize, what: &str| {
                outputs[idx]
                    .try_extract_tensor::<f32>()
                    .map(|(_, data)| data)
                    .map_err(|e| {
                        DetectorError::InferenceFailed(format!("{what} stride {stride}: {e}"))
                    })
            };

            let level = StrideOutputs {
                stride,
                scores: extract(score_idx, "scores")?,
                bboxes: extract(bbox_idx, "bboxes")?,
                kps: extract(kps_idx, "kps")?,
            };
            candidates.extend(decode_stride(
                &level,
                input_size,
                &letterbox,
                SCRFD_CONFIDENCE_THRESHOLD,
            ));
        }

        let regions = nms(candidates, SCRFD_NMS_THRESHOLD);
        tracing::debug!(?mode, count = regions.len(), "SCRFD detection complete");
        Ok(regions)
    }
}

/// Letterbox an RGB image into a square NCHW float tensor.
///
/// Padding stays at 0.0, which is where the mean normalizes to.
fn preprocess(image: &RgbImage, input_size: usize) -> (Array4<f32>, Letterbox) {
    let letterbox = Letterbox::fit(image.width(), image.height(), input_size);
    let max_side = input_size as u32;
    let new_w = ((image.width() as f32 * letterbox.scale).round() as u32).clamp(1, max_side);
    let new_h = ((image.height() as f32 * letterbox.scale).round() as u32).clamp(1, max_side);
    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let mut tensor = Array4::<f32>::zeros((1, 3, input_size, input_size));
    let pad_x = letterbox.pad_x as usize;
    let pad_y = letterbox.pad_y as usize;

    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = x as usize + pad_x;
        let ty = y as usize + pad_y;
        if tx >= input_size || ty >= input_size {
            continue;
        }
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = (pixel[c] as f32 - SCRFD_MEAN) / SCRFD_STD;
        }
    }

    (tensor, letterbox)
}

/// Discover output tensor ordering by name.
///
/// SCRFD exports either name their outputs ("score_8", "bbox_16", "kps_32", ...)
/// or use generic numeric names. Unrecognized names fall back to the standard
/// positional ordering: [0-2] scores, [3-5] bboxes, [6-8] kps.
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let named: Option<Vec<StrideOutputIndices>> = SCRFD_STRIDES
        .iter()
        .map(|&stride| {
            Some((
                find("score", stride)?,
                find("bbox", stride)?,
                find("kps", stride)?,
            ))
        })
        .collect();

    match named.as_deref() {
        Some(&[s8, s16, s32]) => {
            tracing::info!("SCRFD: using name-based output tensor mapping");
            [s8, s16, s32]
        }
        _ => {
            tracing::info!(
                ?names,
                "SCRFD: output names not recognized, using positional mapping"
            );
            [(0, 3, 6), (1, 4, 7), (2, 5, 8)]
        }
    }
}

/// Decode detections for a single stride level.
fn decode_stride(
    level: &StrideOutputs<'_>,
    input_size: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<FaceRegion> {
    let stride = level.stride as f32;
    let grid_w = input_size / level.stride;
    let grid_h = input_size / level.stride;
    let num_anchors = grid_h * grid_w * SCRFD_ANCHORS_PER_CELL;

    let mut regions = Vec::new();

    for idx in 0..num_anchors {
        let score = level.scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }

        let Some(offsets) = level.bboxes.get(idx * 4..idx * 4 + 4) else {
            continue;
        };

        let cell = idx / SCRFD_ANCHORS_PER_CELL;
        let anchor_x = (cell % grid_w) as f32 * stride;
        let anchor_y = (cell / grid_w) as f32 * stride;

        let (x1, y1) = letterbox.to_original(
            anchor_x - offsets[0] * stride,
            anchor_y - offsets[1] * stride,
        );
        let (x2, y2) = letterbox.to_original(
            anchor_x + offsets[2] * stride,
            anchor_y + offsets[3] * stride,
        );

        let landmarks = level.kps.get(idx * 10..idx * 10 + 10).map(|kps| {
            std::array::from_fn(|i| {
                letterbox.to_original(
                    anchor_x + kps[i * 2] * stride,
                    anchor_y + kps[i * 2 + 1] * stride,
                )
            })
        });

        regions.push(FaceRegion {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
            landmarks,
        });
    }

    regions
}

/// Non-Maximum Suppression. Output is sorted by descending confidence.
fn nms(mut regions: Vec<FaceRegion>, iou_threshold: f32) -> Vec<FaceRegion> {
    regions.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceRegion> = Vec::new();
    for candidate in regions {
        if keep.iter().all(|kept| iou(kept, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

/// Intersection-over-Union between two regions.
fn iou(a: &FaceRegion, b: &FaceRegion) -> f32 {
    let inter_w = (a.right().min(b.right()) - a.left().max(b.left())).max(0.0);
    let inter_h = (a.bottom().min(b.bottom()) - a.top().max(b.top())).max(0.0);
    let inter_area = inter_w * inter_h;
    let union_area = a.width * a.height + b.width * b.height - inter_area;

    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn make_region(x: f32, y: f32, w: f32, h: f32, conf: f32) -> FaceRegion {
        FaceRegion {
            x,
            y,
            width: w,
            height: h,
            confidence: conf,
            landmarks: None,
        }
    }

    #[test]
    fn test_mode_input_sizes() {
        assert_eq!(DetectionMode::Fast.input_size(), 320);
        assert_eq!(DetectionMode::Accurate.input_size(), 640);
        assert_eq!(DetectionMode::default(), DetectionMode::Fast);
    }

    #[test]
    fn test_iou_identical() {
        let a = make_region(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = make_region(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = make_region(20.0, 20.0, 10.0, 10.0, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = make_region(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = make_region(5.0, 0.0, 10.0, 10.0, 1.0);
        // Overlap: 5x10 = 50, union: 100+100-50 = 150
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping_and_sorts() {
        let regions = vec![
            make_region(200.0, 200.0, 50.0, 50.0, 0.7),
            make_region(5.0, 5.0, 100.0, 100.0, 0.8),
            make_region(0.0, 0.0, 100.0, 100.0, 0.9),
        ];
        let result = nms(regions, 0.4);
        assert_eq!(result.len(), 2);
        assert!((result[0].confidence - 0.9).abs() < 1e-6);
        assert!((result[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], 0.4).is_empty());
    }

    #[test]
    fn test_letterbox_roundtrip() {
        let letterbox = Letterbox::fit(320, 240, 640);
        assert!((letterbox.scale - 2.0).abs() < 1e-6);
        assert_eq!(letterbox.pad_x, 0.0);
        assert_eq!(letterbox.pad_y, 80.0);

        let (x, y) = letterbox.to_original(100.0 * 2.0, 50.0 * 2.0 + 80.0);
        assert!((x - 100.0).abs() < 0.1, "x: {x}");
        assert!((y - 50.0).abs() < 0.1, "y: {y}");
    }

    #[test]
    fn test_preprocess_padding_normalizes_to_zero() {
        // Wide image → vertical padding at top and bottom
        let image = RgbImage::from_pixel(64, 32, Rgb([255, 0, 128]));
        let (tensor, letterbox) = preprocess(&image, 320);

        assert_eq!(tensor.shape(), &[1, 3, 320, 320]);
        assert_eq!(letterbox.pad_y, 80.0);
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);

        // Inside the content area channels keep RGB order
        let r = tensor[[0, 0, 160, 160]];
        let g = tensor[[0, 1, 160, 160]];
        let b = tensor[[0, 2, 160, 160]];
        assert!((r - (255.0 - SCRFD_MEAN) / SCRFD_STD).abs() < 1e-2);
        assert!((g - (0.0 - SCRFD_MEAN) / SCRFD_STD).abs() < 1e-2);
        assert!((b - (128.0 - SCRFD_MEAN) / SCRFD_STD).abs() < 1e-2);
    }

    #[test]
    fn test_decode_stride_single_anchor() {
        // Stride 32 on a 64x64 input → 2x2 grid, 8 anchors
        let mut scores = vec![0.0f32; 8];
        scores[3] = 0.9; // cell 1 → (x=32, y=0)
        let mut bboxes = vec![0.0f32; 8 * 4];
        bboxes[12..16].copy_from_slice(&[0.5, 0.0, 0.5, 1.0]);
        let kps = vec![0.0f32; 8 * 10];

        let level = StrideOutputs {
            stride: 32,
            scores: &scores,
            bboxes: &bboxes,
            kps: &kps,
        };
        let identity = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        let regions = decode_stride(&level, 64, &identity, 0.5);

        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        assert_eq!((r.x, r.y, r.width, r.height), (16.0, 0.0, 32.0, 32.0));
        assert_eq!(r.landmarks.unwrap()[0], (32.0, 0.0));
    }

    #[test]
    fn test_discover_output_indices_named() {
        let names: Vec<String> = [
            "score_8", "score_16", "score_32", "bbox_8", "bbox_16", "bbox_32", "kps_8", "kps_16",
            "kps_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        assert_eq!(
            discover_output_indices(&names),
            [(0, 3, 6), (1, 4, 7), (2, 5, 8)]
        );
    }

    #[test]
    fn test_discover_output_indices_shuffled_named() {
        let names: Vec<String> = [
            "bbox_8", "kps_8", "score_8", "bbox_16", "kps_16", "score_16", "bbox_32", "kps_32",
            "score_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        assert_eq!(
            discover_output_indices(&names),
            [(2, 0, 1), (5, 3, 4), (8, 6, 7)]
        );
    }

    #[test]
    fn test_discover_output_indices_positional_fallback() {
        let names: Vec<String> = (0..9).map(|i: usize| i.to_string()).collect();
        assert_eq!(
            discover_output_indices(&names),
            [(0, 3, 6), (1, 4, 7), (2, 5, 8)]
        );
    }
}
