//! Catalog error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from catalog operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error while inspecting the catalog file.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog file does not exist. It is never created here.
    #[error("Catalog not found: {0}")]
    CatalogNotFound(PathBuf),

    /// Structured metadata could not be serialized for storage.
    #[error("Failed to serialize metadata: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The catalog stayed locked through every attempt.
    #[error("Catalog still locked after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: rusqlite::Error,
    },
}

impl DatabaseError {
    /// True for `SQLITE_BUSY` / `SQLITE_LOCKED` failures.
    pub fn is_lock_contention(&self) -> bool {
        matches!(self, Self::Sqlite(e) if crate::catalog::retry::is_lock_contention(e))
    }
}
