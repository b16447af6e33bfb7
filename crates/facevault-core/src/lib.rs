//! facevault-core — Face encoding and enrollment engine.
//!
//! Loads photographs, detects faces with SCRFD and computes 128-dimensional
//! encodings, both via ONNX Runtime on the CPU, then hands one record per
//! photo to a pluggable store.

pub mod alignment;
pub mod detector;
pub mod encoder;
pub mod enroll;
pub mod image_loader;
pub mod pipeline;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use detector::{DetectionMode, FaceDetector, ScrfdDetector};
pub use encoder::{FaceEmbedder, OnnxEmbedder};
pub use enroll::{encode_and_save, encode_and_save_reported, EncodeRequest, EnrollError};
pub use image_loader::load_image;
pub use pipeline::{extract_encoding, identify_faces, Extraction, Identification};
pub use store::{PersonStore, StoreConnection, StoreError, StoreTarget};
pub use types::{
    EuclideanMatcher, FaceEncoding, FaceRegion, MatchResult, Matcher, Metadata, PersonRecord,
    ENCODING_DIM,
};
