//! Resources chosen before a knowledge base exists.

use serde::Serialize;

use crate::types::Resource;

/// Ordered set of selected resources, keyed by `resource_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionSet {
    items: Vec<Resource>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `resource` if absent, remove it if present.
    ///
    /// Returns true when the resource is selected afterwards.
    pub fn toggle(&mut self, resource: &Resource) -> bool {
        if let Some(pos) = self
            .items
            .iter()
            .position(|r| r.resource_id == resource.resource_id)
        {
            self.items.remove(pos);
            false
        } else {
            self.items.push(resource.clone());
            true
        }
    }

    pub fn contains(&self, resource: &Resource) -> bool {
        self.items
            .iter()
            .any(|r| r.resource_id == resource.resource_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn resources(&self) -> &[Resource] {
        &self.items
    }
}

/// Remove every resource that lives below another selected directory.
///
/// Keeps selection order. Applying it to its own output changes nothing.
pub fn prune_ancestors(selected: &[Resource]) -> Vec<Resource> {
    selected
        .iter()
        .filter(|candidate| {
            !selected
                .iter()
                .any(|dir| candidate.is_descendant_of(dir))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_adds_and_removes() {
        let mut selection = SelectionSet::new();
        let file = Resource::file("f", "f.txt");
        assert!(selection.toggle(&file));
        assert!(selection.contains(&file));
        assert!(!selection.toggle(&file));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_prune_keeps_only_top_directory() {
        let selected = vec![
            Resource::file("f1", "/x/a/f1").with_parent("dirA"),
            Resource::directory("dirA", "/x/a"),
            Resource::file("f2", "/x/a/f2").with_parent("dirA"),
        ];
        let pruned = prune_ancestors(&selected);
        let ids: Vec<&str> = pruned.iter().map(|r| r.resource_id.as_str()).collect();
        assert_eq!(ids, vec!["dirA"]);
    }

    #[test]
    fn test_prune_respects_path_boundaries() {
        let selected = vec![
            Resource::directory("a", "/x/a"),
            Resource::directory("ab", "/x/ab"),
            Resource::file("f", "/x/ab/f"),
        ];
        let pruned = prune_ancestors(&selected);
        let ids: Vec<&str> = pruned.iter().map(|r| r.resource_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "ab"]);
    }

    #[test]
    fn test_prune_is_idempotent() {
        let selected = vec![
            Resource::directory("dirA", "/x/a"),
            Resource::directory("sub", "/x/a/sub"),
            Resource::file("f", "/x/a/sub/f"),
            Resource::file("g", "/y/g"),
        ];
        let once = prune_ancestors(&selected);
        let twice = prune_ancestors(&once);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }
}
