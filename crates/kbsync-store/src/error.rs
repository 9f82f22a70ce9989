//! Error types for kbsync-store.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for kbsync-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in kbsync-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store file could not be read or written.
    #[error("Store I/O error at {path}: {message}")]
    StoreIo { path: PathBuf, message: String },

    /// The store file is not valid JSON.
    #[error("Store parse error at {path}: {message}")]
    StoreParse { path: PathBuf, message: String },

    /// IO error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StoreError {
    /// Create a store I/O error.
    pub fn store_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StoreIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a store parse error.
    pub fn store_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StoreParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
