//! Persisted knowledge-base membership for the offline mode.
//!
//! The set of indexed resources lives as one serialized list under the
//! `kb_resources` key. Every add or remove rewrites the full list.

use std::path::Path;
use std::sync::Mutex;

use kbsync_core::Resource;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::kv::KeyValueFile;

/// Storage key of the membership list.
pub const KB_RESOURCES_KEY: &str = "kb_resources";

#[derive(Debug)]
pub struct MembershipStore {
    kv: KeyValueFile,
    write_lock: Mutex<()>,
}

impl MembershipStore {
    /// Open the store backed by the file at `path`. Nothing is created until
    /// the first write.
    pub fn open(path: impl AsRef<Path>) -> Self {
        debug!("Opening MembershipStore at {:?}", path.as_ref());
        Self {
            kv: KeyValueFile::new(path.as_ref()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        self.kv.path()
    }

    /// Every stored resource.
    ///
    /// A list that no longer parses is a [`StoreError::StoreParse`]; the file
    /// is left as it is.
    pub fn load(&self) -> StoreResult<Vec<Resource>> {
        let Some(raw) = self.kv.get(KB_RESOURCES_KEY)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|e| {
            warn!("Unreadable {} list: {}", KB_RESOURCES_KEY, e);
            StoreError::store_parse(self.kv.path(), format!("{} list: {}", KB_RESOURCES_KEY, e))
        })
    }

    /// Add `resource`, replacing any stored record with the same id.
    pub fn add(&self, resource: &Resource) -> StoreResult<()> {
        let _guard = self.lock()?;
        let mut resources = self.load()?;
        resources.retain(|r| r.resource_id != resource.resource_id);
        resources.push(resource.clone());
        self.save(&resources)
    }

    /// Remove the record whose id or path equals `key`.
    ///
    /// Returns false when nothing matched.
    pub fn remove(&self, key: &str) -> StoreResult<bool> {
        let _guard = self.lock()?;
        let mut resources = self.load()?;
        let before = resources.len();
        resources.retain(|r| r.resource_id.as_str() != key && r.path != key);
        let removed = resources.len() != before;
        self.save(&resources)?;
        Ok(removed)
    }

    /// Remove every stored record.
    pub fn clear(&self) -> StoreResult<()> {
        let _guard = self.lock()?;
        self.kv.remove(KB_RESOURCES_KEY).map(|_| ())
    }

    fn save(&self, resources: &[Resource]) -> StoreResult<()> {
        self.kv
            .set(KB_RESOURCES_KEY, serde_json::to_string(resources)?)?;
        debug!("Persisted {} membership record(s)", resources.len());
        Ok(())
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|e| StoreError::internal(format!("Failed to acquire store lock: {}", e)))
    }
}
