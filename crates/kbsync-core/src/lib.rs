//! # kbsync-core
//!
//! **Knowledge-base sync** – client-side synchronization engine.
//!
//! Browses a remote resource hierarchy and keeps three views of it consistent:
//! the directory listing, the knowledge-base membership snapshot, and the
//! operations this client issued but the backend has not confirmed yet.
//!
//! ## Main Types
//!
//! - [`ExplorerSession`] – the surface a presentation layer drives
//! - [`ResourceRepository`] – async contract of the repository API
//! - [`MutationOrchestrator`] – toggles, batch creation, pending bookkeeping
//! - [`SyncError`] – domain-specific error type
//!
//! ## Modules
//!
//! - [`reconcile`] – pure status derivation and the pending-clear rule
//! - [`query`] – keyed caches with invalidation events
//! - [`navigation`] – directory path, pagination, search
//! - [`scheduler`] – timers and clocks for debounce and polling
//! - [`config`] – `SyncConfig` loaded from `~/.kbsync/config.yaml`
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use kbsync_core::{AuthContext, ExplorerSession, SessionSettings, SystemClock};
//!
//! let mut session = ExplorerSession::new(
//!     repository,
//!     AuthContext::with_token(token),
//!     true,
//!     SessionSettings::default(),
//!     Arc::new(SystemClock::new()),
//! );
//! session.refresh().await;
//! for row in session.view().resources {
//!     println!("{} {}", row.status, row.resource.path);
//! }
//! ```

// Modules
pub mod config;
pub mod constants;
pub mod debounce;
pub mod errors;
pub mod navigation;
pub mod orchestrator;
pub mod pending;
pub mod poller;
pub mod query;
pub mod reconcile;
pub mod repository;
pub mod scheduler;
pub mod selection;
pub mod session;
pub mod tree;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use config::{OfflineConfig, SyncConfig};
pub use constants::{
    CONFIG_FILENAME, DEFAULT_CONNECTION_PROVIDER, DEFAULT_PAGE_SIZE, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_SEARCH_DEBOUNCE_MS, KBSYNC_HOME_DIR, ROOT_BREADCRUMB, ROOT_DIRECTORY_ID,
    ROOT_PATH_FILTER, STORE_FILENAME, TOKEN_FILENAME,
};
pub use errors::SyncError;
pub use navigation::{Breadcrumb, Navigation};
pub use orchestrator::{
    plan_toggle, CreateOutcome, DispatchReport, MutationContext, MutationOrchestrator,
    ToggleOutcome,
};
pub use pending::PendingMap;
pub use query::{CacheEvent, ListingKey, MembershipKey, QueryKey, QueryLayer};
pub use reconcile::{clear_confirmed, reconcile};
pub use repository::{
    AuthContext, RepositoryError, RepositoryResult, ResourceRepository, UnauthorizedSignal,
};
pub use scheduler::{Clock, ManualClock, SystemClock};
pub use selection::{prune_ancestors, SelectionSet};
pub use session::{ExplorerSession, ExplorerView, RefreshReport, SessionSettings, TickReport};
pub use tree::ResourceIndex;
pub use types::{
    Connection, IndexStatus, KnowledgeBase, Organization, Page, PendingOperation, Resource,
    ResourceId, ResourceKind, ResourceView,
};
