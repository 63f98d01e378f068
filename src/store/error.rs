//! Store error types.

use std::path::PathBuf;

use thiserror::Error;

use super::BackendKind;

/// Errors raised by configuration stores and their backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// A persisted record could not be decoded.
    #[error("malformed record for guild {key}: {reason}")]
    Malformed { key: String, reason: String },

    #[error("unknown store backend '{0}'")]
    UnknownBackend(String),

    /// A backend could not be built from its argument string.
    #[error("cannot construct {kind} backend: {reason}")]
    Construction { kind: BackendKind, reason: String },

    /// The store a config handle belongs to has been dropped.
    #[error("config store for guild {0} is no longer available")]
    Closed(u64),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(key: impl ToString, reason: impl ToString) -> Self {
        Self::Malformed {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
