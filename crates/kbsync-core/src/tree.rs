//! Parent/child index over the cached resource snapshot.
//!
//! Recursive toggles walk this arena instead of chasing `parent_id` links
//! through the cache. Only resources that were actually loaded appear here, so
//! a directory whose children were never listed has no known descendants.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::constants::MAX_TRAVERSAL_DEPTH;
use crate::types::{Resource, ResourceId};

/// Arena of resources keyed by id, with a parent -> children adjacency.
#[derive(Debug, Clone, Default)]
pub struct ResourceIndex {
    nodes: Vec<Resource>,
    by_id: HashMap<ResourceId, usize>,
    children: HashMap<ResourceId, Vec<usize>>,
}

impl ResourceIndex {
    /// Build the index from any number of cached listings.
    ///
    /// Duplicate ids (the same resource seen on several pages or in a search
    /// result) keep their first occurrence.
    pub fn from_snapshot<'a>(resources: impl IntoIterator<Item = &'a Resource>) -> Self {
        let mut index = Self::default();
        for resource in resources {
            if index.by_id.contains_key(&resource.resource_id) {
                continue;
            }
            let slot = index.nodes.len();
            index.by_id.insert(resource.resource_id.clone(), slot);
            if let Some(parent) = &resource.parent_id {
                index.children.entry(parent.clone()).or_default().push(slot);
            }
            index.nodes.push(resource.clone());
        }
        index
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
        self.by_id.get(id).map(|&slot| &self.nodes[slot])
    }

    /// Direct children of `id` known to the snapshot.
    pub fn children_of<'a>(&'a self, id: &ResourceId) -> impl Iterator<Item = &'a Resource> + 'a {
        self.children
            .get(id)
            .into_iter()
            .flatten()
            .map(move |&slot| &self.nodes[slot])
    }

    /// Every known descendant of `id`, breadth first.
    ///
    /// Walks at most [`MAX_TRAVERSAL_DEPTH`] levels and visits each id once,
    /// so malformed parent links cannot loop forever.
    pub fn descendants(&self, id: &ResourceId) -> Vec<&Resource> {
        let mut out = Vec::new();
        let mut seen: HashSet<&ResourceId> = HashSet::new();
        seen.insert(id);

        let mut queue: VecDeque<(&ResourceId, usize)> = VecDeque::new();
        queue.push_back((id, 0));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= MAX_TRAVERSAL_DEPTH {
                tracing::warn!(resource = %current, "Stopped descending: nesting too deep");
                continue;
            }
            for child in self.children_of(current) {
                if !seen.insert(&child.resource_id) {
                    continue;
                }
                out.push(child);
                if child.is_directory() {
                    queue.push_back((&child.resource_id, depth + 1));
                }
            }
        }
        out
    }
}
