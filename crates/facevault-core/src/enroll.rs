//! Encode-and-persist: image path + name in, one stored record out.
//!
//! The flow is strictly linear: validate, load, detect and encode, persist.
//! Any failure stops the flow before the store is touched, except a failed
//! write, which the store itself rolls back. Exactly one record is written on
//! success and none on failure.

use crate::detector::FaceDetector;
use crate::encoder::FaceEmbedder;
use crate::image_loader::{self, ImageLoadError};
use crate::pipeline::{self, Extraction, PipelineError};
use crate::store::{PersonStore, StoreConnection, StoreError, StoreTarget};
use crate::types::{Metadata, PersonRecord};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("person name must not be empty")]
    InvalidName,
    #[error(transparent)]
    ImageLoad(#[from] ImageLoadError),
    #[error("no face detected in {}", .0.display())]
    NoFaceFound(PathBuf),
    #[error("encoding failed: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

impl EnrollError {
    /// True for the expected negative outcome (no usable face in the image).
    pub fn is_no_face(&self) -> bool {
        matches!(self, EnrollError::NoFaceFound(_))
    }
}

/// One encode-and-save invocation.
#[derive(Debug, Clone)]
pub struct EncodeRequest<'a> {
    pub image_path: &'a Path,
    pub name: &'a str,
    pub metadata: Option<Metadata>,
    pub target: &'a StoreTarget,
}

/// Load an image, encode its face and store `{name, encoding, metadata}`.
///
/// A fresh connection is opened for the write and closed afterwards on every
/// path. A close error after a successful write is only logged: the record
/// is already durable.
pub fn encode_and_save<D, E, S>(
    request: EncodeRequest<'_>,
    detector: &mut D,
    embedder: &mut E,
    store: &S,
) -> Result<PersonRecord, EnrollError>
where
    D: FaceDetector + ?Sized,
    E: FaceEmbedder + ?Sized,
    S: PersonStore + ?Sized,
{
    let name = request.name;
    if name.trim().is_empty() {
        return Err(EnrollError::InvalidName);
    }

    let image = image_loader::load_image(request.image_path)?;

    let encoding = match pipeline::extract_encoding(detector, embedder, &image)? {
        Extraction::Encoded(encoding) => encoding,
        Extraction::NoFaceFound => {
            return Err(EnrollError::NoFaceFound(request.image_path.to_path_buf()));
        }
    };
    drop(image);

    let record = PersonRecord::new(name, encoding, request.metadata);
    persist(store, request.target, &record)?;

    tracing::info!(
        name,
        id = %record.id,
        target = %request.target,
        "face encoding saved"
    );
    Ok(record)
}

fn persist<S>(store: &S, target: &StoreTarget, record: &PersonRecord) -> Result<(), StoreError>
where
    S: PersonStore + ?Sized,
{
    let mut connection = store.open(target)?;
    let written = connection.write(record);

    if let Err(err) = connection.close() {
        tracing::warn!(
            error = %err,
            %target,
            write_ok = written.is_ok(),
            "store connection close failed"
        );
    }

    written
}

/// Boolean view over [`encode_and_save`].
///
/// Every failure, including a panic inside a detector, embedder or store
/// implementation, becomes `false` plus a logged diagnostic.
pub fn encode_and_save_reported<D, E, S>(
    request: EncodeRequest<'_>,
    detector: &mut D,
    embedder: &mut E,
    store: &S,
) -> bool
where
    D: FaceDetector + ?Sized,
    E: FaceEmbedder + ?Sized,
    S: PersonStore + ?Sized,
{
    let image_path = request.image_path.to_path_buf();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        encode_and_save(request, detector, embedder, store)
    }));

    match outcome {
        Ok(Ok(_)) => true,
        Ok(Err(err)) if err.is_no_face() => {
            tracing::warn!(path = %image_path.display(), "{err}");
            false
        }
        Ok(Err(err)) => {
            tracing::error!(path = %image_path.display(), error = %err, "error processing image");
            false
        }
        Err(_) => {
            tracing::error!(
                path = %image_path.display(),
                "unexpected panic while processing image"
            );
            false
        }
    }
}
