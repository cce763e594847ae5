//! Error types for storage backends.

use std::path::PathBuf;

/// Errors that can occur when reading or writing cache storage.
///
/// None of these are fatal to a cache lookup: the engine treats a failed
/// read as a miss and a failed write as "not cached this time".
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An I/O error occurred on a known path.
    #[error("I/O error on {path}: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The payload could not be serialized.
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// The storage medium refused the operation.
    #[error("storage unavailable: {reason}")]
    Unavailable { reason: String },

    /// Invalid backend configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    /// Creates a new path-scoped I/O error.
    pub fn path(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Path {
            path: path.into(),
            source,
        }
    }

    /// Creates a new storage unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}
