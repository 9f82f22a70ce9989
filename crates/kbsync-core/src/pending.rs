//! Locally issued operations awaiting backend confirmation.

use std::collections::BTreeMap;

use crate::types::{PendingOperation, ResourceId};

/// Map of `resource_id -> operation` for unconfirmed mutations.
///
/// Ordered so that iteration (and therefore logging and tests) is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingMap {
    entries: BTreeMap<ResourceId, PendingOperation>,
}

impl PendingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `op` for `id`, replacing any earlier entry.
    pub fn mark(&mut self, id: ResourceId, op: PendingOperation) {
        self.entries.insert(id, op);
    }

    pub fn get(&self, id: &ResourceId) -> Option<PendingOperation> {
        self.entries.get(id).copied()
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn remove(&mut self, id: &ResourceId) -> Option<PendingOperation> {
        self.entries.remove(id)
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&ResourceId, PendingOperation) -> bool) {
        self.entries.retain(|id, op| keep(id, *op));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, PendingOperation)> {
        self.entries.iter().map(|(id, op)| (id, *op))
    }
}

impl FromIterator<(ResourceId, PendingOperation)> for PendingMap {
    fn from_iter<I: IntoIterator<Item = (ResourceId, PendingOperation)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_replaces_operation() {
        let mut pending = PendingMap::new();
        pending.mark("a".into(), PendingOperation::Index);
        pending.mark("a".into(), PendingOperation::Deindex);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending.get(&"a".into()), Some(PendingOperation::Deindex));
    }

    #[test]
    fn test_iteration_is_ordered() {
        let pending: PendingMap = [
            ("b".into(), PendingOperation::Index),
            ("a".into(), PendingOperation::Deindex),
        ]
        .into_iter()
        .collect();
        let ids: Vec<&str> = pending.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
