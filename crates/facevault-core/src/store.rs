//! Persistence capability: open a connection, write one record, close.

use crate::types::PersonRecord;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to open store at {target}: {reason}")]
    Open { target: String, reason: String },
    #[error("write rejected: {0}")]
    Write(String),
    #[error("read failed: {0}")]
    Read(String),
    #[error("failed to close connection: {0}")]
    Close(String),
}

/// Where records are stored. Passed explicitly to every store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreTarget {
    path: PathBuf,
}

impl StoreTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for StoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// An open connection to a record store.
///
/// Implementations must also release their resources on `Drop`, so a
/// connection abandoned on an error path is never leaked.
pub trait StoreConnection {
    /// Durably write one record. A failed write leaves no partial record.
    fn write(&mut self, record: &PersonRecord) -> Result<(), StoreError>;

    /// Release the connection, reporting any error from doing so.
    fn close(self) -> Result<(), StoreError>
    where
        Self: Sized;
}

/// Opens connections to a record store.
pub trait PersonStore {
    type Connection: StoreConnection;

    fn open(&self, target: &StoreTarget) -> Result<Self::Connection, StoreError>;
}
