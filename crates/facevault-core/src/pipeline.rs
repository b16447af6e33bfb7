//! Encoding pipeline: detect faces in an image, encode one for enrollment or
//! all of them for identification.

use crate::detector::{DetectionMode, DetectorError, FaceDetector};
use crate::encoder::{EmbedderError, FaceEmbedder};
use crate::types::{FaceEncoding, FaceRegion, Matcher, PersonRecord};
use image::RgbImage;
use thiserror::Error;

/// Detection mode used for enrollment. Fixed: callers cannot override it.
pub const PIPELINE_DETECTION_MODE: DetectionMode = DetectionMode::Fast;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("embedder error: {0}")]
    Embedder(#[from] EmbedderError),
}

/// Outcome of a successful pipeline run. Finding no face is a normal result.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Encoded(FaceEncoding),
    NoFaceFound,
}

/// Extract one face encoding from an image.
///
/// When several faces are present the first region in detector order is
/// encoded. With [`crate::ScrfdDetector`] that is the most confident face;
/// other detectors may order differently.
pub fn extract_encoding<D, E>(
    detector: &mut D,
    embedder: &mut E,
    image: &RgbImage,
) -> Result<Extraction, PipelineError>
where
    D: FaceDetector + ?Sized,
    E: FaceEmbedder + ?Sized,
{
    let regions = detector.detect_regions(image, PIPELINE_DETECTION_MODE)?;

    let Some(selected) = regions.first() else {
        tracing::info!("no face detected in the image");
        return Ok(Extraction::NoFaceFound);
    };

    if regions.len() > 1 {
        tracing::warn!(
            count = regions.len(),
            "multiple faces detected, using the first one"
        );
    }

    let encoding = embedder
        .compute_embeddings(image, std::slice::from_ref(selected))?
        .into_iter()
        .next()
        .flatten();

    match encoding {
        Some(encoding) => {
            tracing::debug!(confidence = selected.confidence, "face encoded");
            Ok(Extraction::Encoded(encoding))
        }
        None => {
            tracing::info!("failed to extract encoding from detected face");
            Ok(Extraction::NoFaceFound)
        }
    }
}

/// One face found by [`identify_faces`].
#[derive(Debug, Clone)]
pub struct Identification {
    pub region: FaceRegion,
    /// Name of the closest record within tolerance, `None` for an unknown face.
    pub name: Option<String>,
    /// Distance to the closest record (`f32::INFINITY` if unencodable or no records).
    pub distance: f32,
}

/// Detect every face in an image and match each one against `gallery`.
///
/// Used per camera frame; each call is independent of the previous ones.
pub fn identify_faces<D, E, M>(
    detector: &mut D,
    embedder: &mut E,
    matcher: &M,
    image: &RgbImage,
    gallery: &[PersonRecord],
    tolerance: f32,
) -> Result<Vec<Identification>, PipelineError>
where
    D: FaceDetector + ?Sized,
    E: FaceEmbedder + ?Sized,
    M: Matcher + ?Sized,
{
    let regions = detector.detect_regions(image, PIPELINE_DETECTION_MODE)?;
    if regions.is_empty() {
        return Ok(Vec::new());
    }

    let encodings = embedder.compute_embeddings(image, &regions)?;

    Ok(regions
        .into_iter()
        .zip(encodings.into_iter().chain(std::iter::repeat(None)))
        .map(|(region, encoding)| match encoding {
            Some(encoding) => {
                let result = matcher.compare(&encoding, gallery, tolerance);
                Identification {
                    region,
                    name: result.name,
                    distance: result.distance,
                }
            }
            None => Identification {
                region,
                name: None,
                distance: f32::INFINITY,
            },
        })
        .collect())
}
