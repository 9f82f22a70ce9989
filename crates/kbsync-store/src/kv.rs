//! Single-file key/value persistence.
//!
//! The file is one JSON object mapping keys to serialized string values. Every
//! write rewrites the whole file through a temporary sibling and a rename, so
//! readers never observe a half-written document.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct KeyValueFile {
    path: PathBuf,
}

impl KeyValueFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the value stored under `key`.
    pub fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    /// Store `value` under `key`, replacing the previous value.
    pub fn set(&self, key: &str, value: String) -> StoreResult<()> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value);
        self.write_all(&entries)
    }

    /// Remove `key`. Returns false if it was absent.
    pub fn remove(&self, key: &str) -> StoreResult<bool> {
        let mut entries = self.read_all()?;
        let removed = entries.remove(key).is_some();
        if removed {
            self.write_all(&entries)?;
        }
        Ok(removed)
    }

    fn read_all(&self) -> StoreResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            trace!("Store file {:?} does not exist yet", self.path);
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| StoreError::store_io(&self.path, e.to_string()))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| StoreError::store_parse(&self.path, e.to_string()))
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::store_io(parent, e.to_string()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(entries)?;
        fs::write(&tmp, body).map_err(|e| StoreError::store_io(&tmp, e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::store_io(&self.path, e.to_string()))?;
        debug!("Wrote {} key(s) to {:?}", entries.len(), self.path);
        Ok(())
    }
}
