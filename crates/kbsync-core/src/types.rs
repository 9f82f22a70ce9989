//! Common types for kbsync-core.
//!
//! This module contains the records exchanged with the repository API
//! ([`Resource`], [`Connection`], [`KnowledgeBase`], [`Organization`],
//! [`Page`]) and the locally derived values layered on top of them
//! ([`IndexStatus`], [`PendingOperation`], [`ResourceView`]).
//!
//! Field names follow the wire format of the repository API so that records
//! can be persisted and served verbatim by the offline store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// ResourceId
// ============================================================================

/// Opaque identifier of a resource, unique within a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
    /// Create a new resource id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// Resource
// ============================================================================

/// Kind of a node in the external hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    File,
    Directory,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// A node in the external hierarchy (file or directory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Opaque id, unique within the connection.
    pub resource_id: ResourceId,

    /// Hierarchical path such as `My Documents/Subfolder A`.
    #[serde(rename = "inode_path", with = "inode_path")]
    pub path: String,

    /// File or directory.
    #[serde(rename = "inode_type")]
    pub kind: ResourceKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Id of the containing directory; absent for top-level resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ResourceId>,
}

impl Resource {
    /// Create a file resource at the given path.
    pub fn file(id: impl Into<ResourceId>, path: impl Into<String>) -> Self {
        Self {
            resource_id: id.into(),
            path: path.into(),
            kind: ResourceKind::File,
            mime_type: None,
            parent_id: None,
        }
    }

    /// Create a directory resource at the given path.
    pub fn directory(id: impl Into<ResourceId>, path: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Directory,
            ..Self::file(id, path)
        }
    }

    /// Set the parent directory id.
    pub fn with_parent(mut self, parent_id: impl Into<ResourceId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Set the mime type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn is_directory(&self) -> bool {
        self.kind == ResourceKind::Directory
    }

    /// Last path segment, used as the display name.
    pub fn name(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.path)
    }

    /// Returns true if `self` lives strictly below the directory `dir`.
    ///
    /// The test is purely path based: `self.path` must start with
    /// `dir.path + "/"`. A resource is never its own descendant.
    pub fn is_descendant_of(&self, dir: &Resource) -> bool {
        if !dir.is_directory() || self.resource_id == dir.resource_id {
            return false;
        }
        self.path
            .strip_prefix(dir.path.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Serde adapter for the `inode_path: { path }` wire shape.
mod inode_path {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct InodePathRef<'a> {
        path: &'a str,
    }

    #[derive(Deserialize)]
    struct InodePath {
        path: String,
    }

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S>(path: &String, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        InodePathRef { path }.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        InodePath::deserialize(deserializer).map(|p| p.path)
    }
}

// ============================================================================
// Derived status
// ============================================================================

/// Display status of a resource relative to the active knowledge base.
///
/// Never stored; produced only by [`crate::reconcile::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexStatus {
    NotIndexed,
    Indexing,
    Indexed,
}

impl std::fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotIndexed => write!(f, "not indexed"),
            Self::Indexing => write!(f, "indexing"),
            Self::Indexed => write!(f, "indexed"),
        }
    }
}

/// A locally issued operation that the backend has not yet confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingOperation {
    Index,
    Deindex,
}

impl PendingOperation {
    /// The status the resource will have once the backend confirms the operation.
    pub fn target_status(self) -> IndexStatus {
        match self {
            Self::Index => IndexStatus::Indexed,
            Self::Deindex => IndexStatus::NotIndexed,
        }
    }
}

impl std::fmt::Display for PendingOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index => write!(f, "index"),
            Self::Deindex => write!(f, "deindex"),
        }
    }
}

/// A resource decorated with its reconciled status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceView {
    #[serde(flatten)]
    pub resource: Resource,
    pub status: IndexStatus,
}

// ============================================================================
// External identities
// ============================================================================

/// A configured connector to a third-party resource store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub connection_id: String,
    pub name: String,
    #[serde(default)]
    pub connection_provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A named collection of indexed resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub knowledge_base_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connection_source_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl KnowledgeBase {
    /// Display name, falling back to the id for unnamed bases.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.knowledge_base_id)
    }
}

/// The organization the authenticated user belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub org_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ============================================================================
// Page
// ============================================================================

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub current_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A single page holding every item, with no further cursor.
    pub fn single(data: Vec<T>) -> Self {
        Self {
            data,
            next_cursor: None,
            current_cursor: None,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::single(Vec::new())
    }
}
