//! Repository client contract.
//!
//! [`ResourceRepository`] is the seam between the sync engine and the remote
//! repository API. `kbsync-client` provides the HTTP and offline
//! implementations; tests use an in-memory fake.
//!
//! Every call takes the bearer token explicitly. The token and its readiness
//! live in an [`AuthContext`] owned by the caller, so no repository keeps
//! global auth state.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use crate::types::{Connection, KnowledgeBase, Organization, Page, Resource, ResourceId};

/// Result alias for repository calls.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

// ============================================================================
// RepositoryError
// ============================================================================

/// Failure of a single repository call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The API answered with an unexpected status code.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code returned by the API.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The bearer token was rejected (HTTP 401).
    #[error("Unauthorized: the session token was rejected")]
    Unauthorized,

    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The local membership store failed.
    #[error("Local store error: {0}")]
    Store(String),

    /// A required input (token, ids) was missing.
    #[error("Missing required input: {0}")]
    MissingInput(String),
}

impl RepositoryError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

// ============================================================================
// ResourceRepository
// ============================================================================

/// Async contract of the repository API.
///
/// `online` selects between the backend and the self-contained offline mode
/// for implementations that support both. Calls that have no offline
/// counterpart in the API shape (organization, create, sync) leave the choice
/// to the implementation.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// List the connections available to the user.
    async fn list_connections(&self, online: bool, token: &str)
        -> RepositoryResult<Vec<Connection>>;

    /// List one page of resources.
    ///
    /// A search term takes precedence over `parent_id`; when neither is set
    /// the root of the connection is listed.
    async fn list_resources(
        &self,
        online: bool,
        token: &str,
        connection_id: &str,
        parent_id: Option<&ResourceId>,
        search_term: Option<&str>,
        cursor: Option<&str>,
    ) -> RepositoryResult<Page<Resource>>;

    /// Get the organization of the authenticated user.
    async fn get_current_organization(&self, token: &str) -> RepositoryResult<Organization>;

    /// List the knowledge bases of the user.
    async fn list_knowledge_bases(
        &self,
        online: bool,
        token: &str,
    ) -> RepositoryResult<Vec<KnowledgeBase>>;

    /// Create a knowledge base over the given resources.
    async fn create_knowledge_base(
        &self,
        token: &str,
        connection_id: &str,
        resource_ids: &[ResourceId],
    ) -> RepositoryResult<KnowledgeBase>;

    /// Trigger indexing of a knowledge base. Does not wait for completion.
    async fn sync_knowledge_base(
        &self,
        token: &str,
        knowledge_base_id: &str,
        org_id: &str,
    ) -> RepositoryResult<()>;

    /// Snapshot of the resources currently in a knowledge base.
    async fn list_knowledge_base_resources(
        &self,
        online: bool,
        token: &str,
        knowledge_base_id: &str,
        path_filter: Option<&str>,
    ) -> RepositoryResult<Page<Resource>>;

    /// Add a resource to a knowledge base.
    async fn add_knowledge_base_resource(
        &self,
        online: bool,
        token: &str,
        knowledge_base_id: &str,
        resource: &Resource,
    ) -> RepositoryResult<()>;

    /// Remove a resource from a knowledge base, addressed by its path.
    async fn remove_knowledge_base_resource(
        &self,
        online: bool,
        token: &str,
        knowledge_base_id: &str,
        resource_path: &str,
    ) -> RepositoryResult<()>;
}

// ============================================================================
// AuthContext
// ============================================================================

/// Bearer token plus a readiness flag.
///
/// `ready` turns true once the persisted token has been looked up, whether or
/// not one was found. Queries are only issued when a token is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    token: Option<String>,
    ready: bool,
}

impl AuthContext {
    /// A context that has not finished loading.
    pub fn new() -> Self {
        Self::default()
    }

    /// A ready context holding `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ready: true,
        }
    }

    /// Finish loading with whatever token was persisted.
    pub fn load(&mut self, token: Option<String>) {
        self.token = token.filter(|t| !t.trim().is_empty());
        self.ready = true;
    }

    /// Forget the token (logout or forced logout after a 401).
    pub fn clear(&mut self) {
        self.token = None;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_authenticated(&self) -> bool {
        self.ready && self.token.is_some()
    }

    /// The token, or [`RepositoryError::MissingInput`] when absent.
    pub fn require_token(&self) -> RepositoryResult<&str> {
        self.token()
            .ok_or_else(|| RepositoryError::MissingInput("bearer token".to_string()))
    }
}

// ============================================================================
// UnauthorizedSignal
// ============================================================================

/// Process-wide notification raised whenever the API answers 401.
///
/// Cloning shares the same channel. Subscribers see a monotonically increasing
/// counter and react by clearing their [`AuthContext`].
#[derive(Debug, Clone)]
pub struct UnauthorizedSignal {
    tx: Arc<watch::Sender<u64>>,
}

impl Default for UnauthorizedSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl UnauthorizedSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the signal.
    pub fn raise(&self) {
        self.tx.send_modify(|count| *count += 1);
        tracing::warn!("Repository rejected the session token");
    }

    /// Number of times the signal has been raised.
    pub fn raised_count(&self) -> u64 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_context_lifecycle() {
        let mut auth = AuthContext::new();
        assert!(!auth.is_ready());
        assert!(auth.require_token().is_err());

        auth.load(Some("tok".to_string()));
        assert!(auth.is_authenticated());
        assert_eq!(auth.require_token().unwrap(), "tok");

        auth.clear();
        assert!(auth.is_ready());
        assert!(!auth.is_authenticated());
    }

    #[test]
    fn test_blank_token_is_ignored() {
        let mut auth = AuthContext::new();
        auth.load(Some("  \n".to_string()));
        assert!(auth.is_ready());
        assert!(auth.token().is_none());
    }

    #[test]
    fn test_unauthorized_signal_is_shared() {
        let signal = UnauthorizedSignal::new();
        let mut rx = signal.subscribe();
        let clone = signal.clone();

        clone.raise();
        assert_eq!(signal.raised_count(), 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Http {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 500: boom");
        assert!(RepositoryError::Unauthorized.is_unauthorized());
    }
}
