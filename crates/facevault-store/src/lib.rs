//! facevault-store — SQLite persistence for person records.
//!
//! One row per record. Encodings are stored as little-endian `f32` blobs,
//! metadata as JSON text and timestamps as RFC 3339 strings. Each write is a
//! single `INSERT`, so a failed write leaves nothing behind.

use chrono::{DateTime, Utc};
use facevault_core::types::EncodingDimError;
use facevault_core::{
    FaceEncoding, Metadata, PersonRecord, PersonStore, StoreConnection, StoreError, StoreTarget,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use thiserror::Error;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS person_records (
    id            TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    encoding      BLOB NOT NULL,
    dim           INTEGER NOT NULL,
    model_version TEXT,
    metadata      TEXT,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS person_records_name ON person_records(name);
";

const SELECT_COLUMNS: &str =
    "SELECT id, name, encoding, model_version, metadata, created_at FROM person_records";

/// Failure turning a stored row back into a [`PersonRecord`].
#[derive(Error, Debug)]
enum RowDecodeError {
    #[error("encoding blob of {0} bytes is not a whole number of f32 values")]
    Blob(usize),
    #[error(transparent)]
    Dimension(#[from] EncodingDimError),
    #[error("bad metadata JSON: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("bad created_at timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

/// Raw column values for one row, before decoding.
struct StoredRow {
    id: String,
    name: String,
    encoding: Vec<u8>,
    model_version: Option<String>,
    metadata: Option<String>,
    created_at: String,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            encoding: row.get(2)?,
            model_version: row.get(3)?,
            metadata: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn decode(self) -> Result<PersonRecord, RowDecodeError> {
        let values = blob_to_values(&self.encoding)?;
        let metadata = self
            .metadata
            .as_deref()
            .map(serde_json::from_str::<Metadata>)
            .transpose()?;
        let created_at =
            DateTime::parse_from_rfc3339(&self.created_at)?.with_timezone(&Utc);

        Ok(PersonRecord {
            id: self.id,
            name: self.name,
            encoding: FaceEncoding::new(values, self.model_version)?,
            metadata,
            created_at,
        })
    }
}

fn values_to_blob(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_values(blob: &[u8]) -> Result<Vec<f32>, RowDecodeError> {
    if blob.len() % 4 != 0 {
        return Err(RowDecodeError::Blob(blob.len()));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Opens SQLite connections to a database file, creating it on first use.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteStore;

impl SqliteStore {
    /// Read every stored record, oldest first. Opens and closes its own connection.
    pub fn load_all(&self, target: &StoreTarget) -> Result<Vec<PersonRecord>, StoreError> {
        self.read_with(target, SqliteConnection::load_all)
    }

    /// Fetch one record by id. Opens and closes its own connection.
    pub fn get(&self, target: &StoreTarget, id: &str) -> Result<Option<PersonRecord>, StoreError> {
        self.read_with(target, |connection| connection.get(id))
    }

    fn read_with<T>(
        &self,
        target: &StoreTarget,
        read: impl FnOnce(&SqliteConnection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let connection = self.open(target)?;
        let result = read(&connection);
        if let Err(err) = connection.close() {
            tracing::warn!(error = %err, %target, "store connection close failed");
        }
        result
    }
}

impl PersonStore for SqliteStore {
    type Connection = SqliteConnection;

    fn open(&self, target: &StoreTarget) -> Result<SqliteConnection, StoreError> {
        SqliteConnection::open(target.path())
    }
}

/// An open SQLite connection. Dropping it closes the underlying handle.
pub struct SqliteConnection {
    conn: Connection,
    path: PathBuf,
}

impl SqliteConnection {
    fn open(path: &Path) -> Result<Self, StoreError> {
        let open_err = |reason: String| StoreError::Open {
            target: path.display().to_string(),
            reason,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| open_err(format!("cannot create {}: {e}", parent.display())))?;
        }

        let conn = Connection::open(path).map_err(|e| open_err(e.to_string()))?;

        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(|e| open_err(format!("journal_mode: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| open_err(format!("schema: {e}")))?;

        tracing::debug!(path = %path.display(), journal_mode = %mode, "store opened");

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Read every stored record, oldest first.
    pub fn load_all(&self) -> Result<Vec<PersonRecord>, StoreError> {
        let read_err = |e: rusqlite::Error| StoreError::Read(e.to_string());

        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY created_at, rowid"))
            .map_err(read_err)?;
        let rows = stmt
            .query_map([], StoredRow::from_row)
            .map_err(read_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_err)?;

        rows.into_iter()
            .map(|row| {
                let id = row.id.clone();
                row.decode()
                    .map_err(|e| StoreError::Read(format!("record {id}: {e}")))
            })
            .collect()
    }

    /// Fetch one record by id.
    pub fn get(&self, id: &str) -> Result<Option<PersonRecord>, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                [id],
                StoredRow::from_row,
            )
            .optional()
            .map_err(|e| StoreError::Read(e.to_string()))?;

        row.map(|r| {
            r.decode()
                .map_err(|e| StoreError::Read(format!("record {id}: {e}")))
        })
        .transpose()
    }
}

impl StoreConnection for SqliteConnection {
    fn write(&mut self, record: &PersonRecord) -> Result<(), StoreError> {
        let metadata = record
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Write(format!("metadata: {e}")))?;

        self.conn
            .execute(
                "INSERT INTO person_records
                     (id, name, encoding, dim, model_version, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.name,
                    values_to_blob(record.encoding.values()),
                    record.encoding.values().len() as i64,
                    record.encoding.model_version(),
                    metadata,
                    record.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::Write(e.to_string()))?;

        tracing::debug!(
            id = %record.id,
            name = %record.name,
            path = %self.path.display(),
            "record written"
        );
        Ok(())
    }

    fn close(self) -> Result<(), StoreError> {
        self.conn
            .close()
            .map_err(|(_, e)| StoreError::Close(e.to_string()))
    }
}
