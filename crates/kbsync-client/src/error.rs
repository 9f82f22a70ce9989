//! Error types for kbsync-client.

use std::path::PathBuf;
use thiserror::Error;

use kbsync_core::RepositoryError;

/// Result type alias for kbsync-client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised while building clients or talking to the auth service.
///
/// Failures of individual repository calls are reported as
/// [`RepositoryError`] instead, since they cross the `ResourceRepository` seam.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A required setting is absent from the configuration.
    #[error("Missing setting `{key}`: {hint}")]
    MissingSetting { key: String, hint: String },

    /// A configured URL does not parse or cannot carry path segments.
    #[error("Invalid URL `{url}`: {message}")]
    InvalidUrl { url: String, message: String },

    /// The auth service rejected the credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The persisted token file could not be read or written.
    #[error("Token file error at {path}: {message}")]
    TokenFile { path: PathBuf, message: String },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// A repository call failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ClientError {
    /// Create a missing-setting error.
    pub fn missing_setting(key: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::MissingSetting {
            key: key.into(),
            hint: hint.into(),
        }
    }

    /// Create an invalid-URL error.
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a token-file error.
    pub fn token_file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::TokenFile {
            path: path.into(),
            message: message.into(),
        }
    }
}
