//! Common constants used throughout kbsync.
//!
//! This module centralizes paths, file names, and timing defaults so the
//! config layer, the session, and the CLI agree on them.

// ============================================================================
// Directory and File Names
// ============================================================================

/// The name of the global kbsync directory, located at `~/.kbsync/`.
pub const KBSYNC_HOME_DIR: &str = ".kbsync";

/// Config file name inside [`KBSYNC_HOME_DIR`].
pub const CONFIG_FILENAME: &str = "config.yaml";

/// Persisted bearer token file name inside [`KBSYNC_HOME_DIR`].
pub const TOKEN_FILENAME: &str = "token";

/// Offline membership store file name inside [`KBSYNC_HOME_DIR`].
pub const STORE_FILENAME: &str = "kb_resources.json";

// ============================================================================
// Navigation
// ============================================================================

/// Sentinel directory id meaning "top of the hierarchy".
pub const ROOT_DIRECTORY_ID: &str = "root";

/// Membership path filter used while browsing the root directory.
pub const ROOT_PATH_FILTER: &str = "/";

/// Breadcrumb index meaning "jump back to root".
pub const ROOT_BREADCRUMB: isize = -1;

/// Upper bound on directory nesting walked during a recursive toggle.
pub const MAX_TRAVERSAL_DEPTH: usize = 64;

// ============================================================================
// Timing and Paging Defaults
// ============================================================================

/// Interval between membership refreshes while operations are pending.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;

/// Quiet period after the last keystroke before a search term settles.
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 500;

/// Number of resources requested per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Simulated round-trip latency of the offline repository.
pub const DEFAULT_OFFLINE_LATENCY_MS: u64 = 500;

/// Delay before an offline add/remove becomes visible in membership.
pub const DEFAULT_OFFLINE_APPLY_DELAY_MS: u64 = 2_000;

/// Duration of a simulated offline sync trigger.
pub const DEFAULT_OFFLINE_SYNC_DELAY_MS: u64 = 2_000;

/// Connector provider requested when listing connections.
pub const DEFAULT_CONNECTION_PROVIDER: &str = "gdrive";
