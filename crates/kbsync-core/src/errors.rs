//! Error types for kbsync-core.

use thiserror::Error;

use crate::repository::RepositoryError;
use crate::types::{PendingOperation, ResourceId};

/// Domain-specific errors for sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    // -------------------------------------------------------------------------
    // Query Errors
    // -------------------------------------------------------------------------
    /// A cached query could not be refreshed.
    ///
    /// Non-fatal: the previously cached value for the same key stays visible.
    #[error("Failed to fetch {query}: {message}")]
    Fetch {
        /// Human-readable description of the query (e.g. `membership of kb-1 at /`).
        query: String,
        /// Description of the failure.
        message: String,
    },

    // -------------------------------------------------------------------------
    // Mutation Errors
    // -------------------------------------------------------------------------
    /// A single index or deindex call failed.
    ///
    /// The pending entry for the resource is left in place.
    #[error("Failed to {operation} resource `{resource_id}`: {message}")]
    Mutation {
        /// The resource the call was issued for.
        resource_id: ResourceId,
        /// The operation that failed.
        operation: PendingOperation,
        /// Description of the failure.
        message: String,
    },

    /// Creating or syncing a new knowledge base failed.
    ///
    /// All pending entries are rolled back when this is raised.
    #[error("Failed to create knowledge base: {message}")]
    BatchCreation {
        /// Description of the failure.
        message: String,
    },

    /// A required input for an operation was missing.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The requested resource is not part of the current listing.
    #[error("Resource `{0}` is not in the current listing.")]
    ResourceNotFound(String),

    /// The requested resource is a file, not a directory.
    #[error("Resource `{0}` is not a directory.")]
    NotADirectory(String),

    /// A repository call failed outside a query or mutation context.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    /// The configuration file could not be read or parsed.
    #[error("Config invalid: {0}")]
    InvalidConfig(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {message}. {hint}")]
    InvalidConfiguration {
        /// Description of the invalid configuration.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A wrapped generic error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    /// Build a [`SyncError::Fetch`] from a repository failure.
    pub fn fetch(query: impl Into<String>, err: &RepositoryError) -> Self {
        Self::Fetch {
            query: query.into(),
            message: err.to_string(),
        }
    }

    /// Returns true when the underlying cause is a rejected bearer token.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Repository(err) => err.is_unauthorized(),
            Self::Fetch { message, .. }
            | Self::Mutation { message, .. }
            | Self::BatchCreation { message } => {
                message == &RepositoryError::Unauthorized.to_string()
            }
            _ => false,
        }
    }
}
