use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of values in every face encoding.
pub const ENCODING_DIM: usize = 128;

/// Free-form key/value pairs stored alongside a person record.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl FaceRegion {
    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    /// Clamp the box to an image of the given size and return integer pixel
    /// bounds `(x, y, width, height)`, or `None` if nothing remains inside.
    pub fn pixel_bounds(
        &self,
        image_width: u32,
        image_height: u32,
    ) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.left().max(0.0).floor();
        let y0 = self.top().max(0.0).floor();
        let x1 = self.right().min(image_width as f32).ceil();
        let y1 = self.bottom().min(image_height as f32).ceil();

        if !(x1 > x0 && y1 > y0) {
            return None;
        }

        Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("face encoding must have {expected} values, got {actual}")]
pub struct EncodingDimError {
    pub expected: usize,
    pub actual: usize,
}

/// A 128-dimensional face encoding.
///
/// The length is checked on construction and on deserialization, so any
/// `FaceEncoding` in hand is guaranteed to hold exactly [`ENCODING_DIM`] values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EncodingRepr", into = "EncodingRepr")]
pub struct FaceEncoding {
    values: Vec<f32>,
    model_version: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct EncodingRepr {
    values: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_version: Option<String>,
}

impl TryFrom<EncodingRepr> for FaceEncoding {
    type Error = EncodingDimError;

    fn try_from(repr: EncodingRepr) -> Result<Self, Self::Error> {
        FaceEncoding::new(repr.values, repr.model_version)
    }
}

impl From<FaceEncoding> for EncodingRepr {
    fn from(encoding: FaceEncoding) -> Self {
        Self {
            values: encoding.values,
            model_version: encoding.model_version,
        }
    }
}

impl FaceEncoding {
    pub fn new(values: Vec<f32>, model_version: Option<String>) -> Result<Self, EncodingDimError> {
        if values.len() != ENCODING_DIM {
            return Err(EncodingDimError {
                expected: ENCODING_DIM,
                actual: values.len(),
            });
        }
        Ok(Self {
            values,
            model_version,
        })
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Model that produced this encoding (e.g., "mobilefacenet_128").
    pub fn model_version(&self) -> Option<&str> {
        self.model_version.as_deref()
    }

    /// Euclidean distance between two encodings. Lower = more similar.
    pub fn distance(&self, other: &FaceEncoding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// The persisted unit: a named face encoding with optional metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: String,
    pub name: String,
    pub encoding: FaceEncoding,
    pub metadata: Option<Metadata>,
    pub created_at: DateTime<Utc>,
}

impl PersonRecord {
    /// Build a fresh record with a random id, stamped with the current time.
    pub fn new(
        name: impl Into<String>,
        encoding: FaceEncoding,
        metadata: Option<Metadata>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            encoding,
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// Result of matching a probe encoding against a gallery of records.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub matched: bool,
    /// Euclidean distance to the closest record (`f32::INFINITY` for an empty gallery).
    pub distance: f32,
    /// ID of the matched record (if any).
    pub record_id: Option<String>,
    /// Name of the matched record (if any).
    pub name: Option<String>,
}

/// Strategy for comparing a probe encoding against stored records.
pub trait Matcher {
    fn compare(
        &self,
        probe: &FaceEncoding,
        gallery: &[PersonRecord],
        tolerance: f32,
    ) -> MatchResult;
}

/// Nearest-neighbour matcher over Euclidean distance.
///
/// A record matches when its distance is at or below the tolerance; 0.6 is
/// the usual cut-off for 128-dimensional encodings.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(
        &self,
        probe: &FaceEncoding,
        gallery: &[PersonRecord],
        tolerance: f32,
    ) -> MatchResult {
        let mut best_dist = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, record) in gallery.iter().enumerate() {
            let dist = probe.distance(&record.encoding);
            if dist < best_dist {
                best_dist = dist;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) if best_dist <= tolerance => MatchResult {
                matched: true,
                distance: best_dist,
                record_id: Some(gallery[idx].id.clone()),
                name: Some(gallery[idx].name.clone()),
            },
            _ => MatchResult {
                matched: false,
                distance: best_dist,
                record_id: None,
                name: None,
            },
        }
    }
}
