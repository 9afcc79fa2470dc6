use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for configuration, store, and run failures.
///
/// Per-record failures (malformed lines, unreadable fetches) are not errors:
/// they are skipped, counted, and logged where they occur.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A record store could not be opened or scanned.
    #[error("record store '{path}' is unavailable: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },
    /// A store backend returned state that violates its own contract.
    #[error("record store '{path}' returned inconsistent state: {details}")]
    StoreInconsistent { path: PathBuf, details: String },
    /// A query dataset file could not be opened or read.
    #[error("query dataset '{path}' is unavailable: {reason}")]
    QueryUnavailable { path: PathBuf, reason: String },
    /// Failure inside the SQLite store backend.
    #[error("sqlite store failure: {0}")]
    SqliteStore(String),
    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// JSON encoding failure while writing output records.
    #[error("output encode failure: {0}")]
    Encode(#[from] serde_json::Error),
    /// Invalid configuration detected before any processing started.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The run was interrupted through its cancellation token.
    #[error("run cancelled at {0} boundary")]
    Cancelled(String),
}

impl From<rusqlite::Error> for ReconcileError {
    fn from(err: rusqlite::Error) -> Self {
        ReconcileError::SqliteStore(err.to_string())
    }
}
