//! Keyed query cache.
//!
//! Each kind of remote data has its own cache, keyed by the parameters that
//! produced it. Results are stored under the key captured when the request was
//! issued, so a late answer for an old directory or search can never show up
//! under the current one.
//!
//! A failed refresh keeps the previously cached value next to the error.
//! Invalidation only marks entries stale; the session refetches stale entries
//! on its next refresh. Subscribers observe every change as a [`CacheEvent`].

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::types::{Connection, KnowledgeBase, Organization, Page, Resource};

const EVENT_CAPACITY: usize = 64;

// ============================================================================
// Keys and events
// ============================================================================

/// Key of one directory listing page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingKey {
    pub online: bool,
    pub connection_id: String,
    /// Directory id, or the root sentinel.
    pub directory: String,
    /// Settled search term, empty when not searching.
    pub search: String,
    pub page: usize,
}

/// Key of one membership snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MembershipKey {
    pub online: bool,
    pub knowledge_base_id: String,
    pub path_filter: String,
}

/// Any cache key, used in events and invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Organization { online: bool },
    Connections { online: bool },
    KnowledgeBases { online: bool },
    Listing(ListingKey),
    Membership(MembershipKey),
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Organization { .. } => write!(f, "organization"),
            Self::Connections { .. } => write!(f, "connections"),
            Self::KnowledgeBases { .. } => write!(f, "knowledge bases"),
            Self::Listing(key) if key.search.is_empty() => write!(
                f,
                "resources of {} (page {})",
                key.directory,
                key.page + 1
            ),
            Self::Listing(key) => write!(
                f,
                "search results for `{}` (page {})",
                key.search,
                key.page + 1
            ),
            Self::Membership(key) => write!(
                f,
                "membership of {} at {}",
                key.knowledge_base_id, key.path_filter
            ),
        }
    }
}

/// Change notification for cache subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Updated(QueryKey),
    Failed(QueryKey),
    Invalidated(QueryKey),
}

// ============================================================================
// CacheEntry / QueryCache
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    value: Option<V>,
    error: Option<String>,
    stale: bool,
    updated_at: Option<Duration>,
}

impl<V> Default for CacheEntry<V> {
    fn default() -> Self {
        Self {
            value: None,
            error: None,
            stale: false,
            updated_at: None,
        }
    }
}

impl<V> CacheEntry<V> {
    /// Last successfully fetched value.
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// Error of the most recent fetch, if it failed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn updated_at(&self) -> Option<Duration> {
        self.updated_at
    }
}

/// One independently keyed cache.
#[derive(Debug, Clone)]
pub struct QueryCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
}

impl<K, V> Default for QueryCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V> QueryCache<K, V> {
    pub fn entry(&self, key: &K) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    pub fn value(&self, key: &K) -> Option<&V> {
        self.entries.get(key).and_then(CacheEntry::value)
    }

    /// True when the key was never fetched, was invalidated, or last failed.
    pub fn needs_fetch(&self, key: &K) -> bool {
        match self.entries.get(key) {
            None => true,
            Some(entry) => entry.stale || entry.value.is_none(),
        }
    }

    pub fn store_ok(&mut self, key: K, value: V, now: Duration) {
        let entry = self.entries.entry(key).or_default();
        entry.value = Some(value);
        entry.error = None;
        entry.stale = false;
        entry.updated_at = Some(now);
    }

    /// Record a failure, keeping the previous value.
    pub fn store_err(&mut self, key: K, message: String) {
        let entry = self.entries.entry(key).or_default();
        entry.error = Some(message);
        entry.stale = false;
    }

    /// Mark one key stale. Returns false if it was never cached.
    pub fn invalidate(&mut self, key: &K) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                true
            }
            None => false,
        }
    }

    /// Mark every matching key stale and return the keys touched.
    pub fn invalidate_where(&mut self, mut matches: impl FnMut(&K) -> bool) -> Vec<K> {
        self.entries
            .iter_mut()
            .filter(|(key, _)| matches(key))
            .map(|(key, entry)| {
                entry.stale = true;
                key.clone()
            })
            .collect()
    }

    /// Apply `update` to a cached value in place.
    pub fn update_value(&mut self, key: &K, update: impl FnOnce(&mut V)) -> bool {
        match self.entries.get_mut(key).and_then(|e| e.value.as_mut()) {
            Some(value) => {
                update(value);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &CacheEntry<V>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// QueryLayer
// ============================================================================

/// The caches of one explorer session plus their event channel.
#[derive(Debug)]
pub struct QueryLayer {
    pub organization: QueryCache<bool, Organization>,
    pub connections: QueryCache<bool, Vec<Connection>>,
    pub knowledge_bases: QueryCache<bool, Vec<KnowledgeBase>>,
    pub listings: QueryCache<ListingKey, Page<Resource>>,
    pub membership: QueryCache<MembershipKey, Page<Resource>>,
    events: broadcast::Sender<CacheEvent>,
}

impl Default for QueryLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryLayer {
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            organization: QueryCache::default(),
            connections: QueryCache::default(),
            knowledge_bases: QueryCache::default(),
            listings: QueryCache::default(),
            membership: QueryCache::default(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn notify(&self, event: CacheEvent) {
        let _ = self.events.send(event);
    }

    /// Mark one key stale.
    pub fn invalidate(&mut self, key: &QueryKey) -> bool {
        let touched = match key {
            QueryKey::Organization { online } => self.organization.invalidate(online),
            QueryKey::Connections { online } => self.connections.invalidate(online),
            QueryKey::KnowledgeBases { online } => self.knowledge_bases.invalidate(online),
            QueryKey::Listing(k) => self.listings.invalidate(k),
            QueryKey::Membership(k) => self.membership.invalidate(k),
        };
        if touched {
            self.notify(CacheEvent::Invalidated(key.clone()));
        }
        touched
    }

    /// Mark every membership entry of a knowledge base stale.
    pub fn invalidate_membership(&mut self, knowledge_base_id: &str) -> usize {
        let keys = self
            .membership
            .invalidate_where(|k| k.knowledge_base_id == knowledge_base_id);
        for key in &keys {
            self.notify(CacheEvent::Invalidated(QueryKey::Membership(key.clone())));
        }
        keys.len()
    }

    /// Append a newly created knowledge base to the cached list.
    pub fn append_knowledge_base(&mut self, online: bool, knowledge_base: KnowledgeBase, now: Duration) {
        let appended = self.knowledge_bases.update_value(&online, |list| {
            if !list
                .iter()
                .any(|kb| kb.knowledge_base_id == knowledge_base.knowledge_base_id)
            {
                list.push(knowledge_base.clone());
            }
        });
        if !appended {
            self.knowledge_bases
                .store_ok(online, vec![knowledge_base], now);
        }
        self.notify(CacheEvent::Updated(QueryKey::KnowledgeBases { online }));
    }

    /// Every resource cached for a connection, across directories and pages.
    pub fn cached_resources<'a>(
        &'a self,
        online: bool,
        connection_id: &'a str,
    ) -> impl Iterator<Item = &'a Resource> + 'a {
        self.listings
            .iter()
            .filter(move |(key, _)| key.online == online && key.connection_id == connection_id)
            .filter_map(|(_, entry)| entry.value())
            .flat_map(|page| page.data.iter())
    }
}
