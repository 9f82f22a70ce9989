//! Self-contained offline repository.
//!
//! Serves the fixed dataset in [`crate::mock_data`] and keeps knowledge-base
//! membership in a [`MembershipStore`]. Every call waits for a simulated
//! latency. Adds and removes are acknowledged quickly but only reach the
//! store after `apply_delay`, the way a real backend indexes asynchronously.
//! Deferred writes are applied lazily at the start of every later call.
//!
//! Membership is one list shared by all knowledge bases and the path filter
//! is not applied.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use kbsync_core::{
    Clock, Connection, KnowledgeBase, Organization, Page, RepositoryError, RepositoryResult,
    Resource, ResourceId, ResourceRepository, SyncConfig,
};
use kbsync_store::MembershipStore;

use crate::mock_data;

const CURSOR_PREFIX: &str = "cursor-";

/// Upper bound of the acknowledgement delay of add and remove.
const MAX_ACK_DELAY: Duration = Duration::from_millis(200);

/// Timing and paging of the offline repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineSettings {
    pub latency: Duration,
    pub apply_delay: Duration,
    pub sync_delay: Duration,
    pub page_size: usize,
}

impl OfflineSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            latency: config.offline.latency(),
            apply_delay: config.offline.apply_delay(),
            sync_delay: config.offline.sync_delay(),
            page_size: config.page_size,
        }
    }

    /// No delays at all.
    pub fn immediate(page_size: usize) -> Self {
        Self {
            latency: Duration::ZERO,
            apply_delay: Duration::ZERO,
            sync_delay: Duration::ZERO,
            page_size,
        }
    }

    fn ack_delay(&self) -> Duration {
        self.latency.min(MAX_ACK_DELAY)
    }
}

#[derive(Debug, Clone)]
enum Write {
    Add(Resource),
    Remove(String),
}

#[derive(Debug)]
struct DeferredWrite {
    due: Duration,
    write: Write,
}

// ============================================================================
// Pure listing helpers
// ============================================================================

/// Offset encoded in a `cursor-<offset>` cursor. Unknown cursors start over.
pub fn cursor_offset(cursor: Option<&str>) -> usize {
    cursor
        .and_then(|c| c.strip_prefix(CURSOR_PREFIX))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Cut one page starting at `cursor` out of `items`.
pub fn paginate(items: Vec<Resource>, cursor: Option<&str>, limit: usize) -> Page<Resource> {
    let limit = limit.max(1);
    let offset = cursor_offset(cursor);
    let total = items.len();
    let data: Vec<Resource> = items.into_iter().skip(offset).take(limit).collect();
    let next_cursor = (offset + limit < total).then(|| format!("{}{}", CURSOR_PREFIX, offset + limit));
    Page {
        data,
        next_cursor,
        current_cursor: Some(format!("{}{}", CURSOR_PREFIX, offset)),
    }
}

/// Resources matching a listing request.
///
/// A non-empty search term matches anywhere in the path, ignoring case.
/// Otherwise the children of `parent_id` are returned, or the top level when
/// no parent is given.
pub fn filter_listing(
    resources: &[Resource],
    parent_id: Option<&ResourceId>,
    search_term: Option<&str>,
) -> Vec<Resource> {
    match search_term.filter(|s| !s.is_empty()) {
        Some(term) => {
            let needle = term.to_lowercase();
            resources
                .iter()
                .filter(|r| r.path.to_lowercase().contains(&needle))
                .cloned()
                .collect()
        }
        None => resources
            .iter()
            .filter(|r| r.parent_id.as_ref() == parent_id)
            .cloned()
            .collect(),
    }
}

// ============================================================================
// OfflineRepository
// ============================================================================

#[derive(Debug)]
pub struct OfflineRepository {
    store: MembershipStore,
    clock: Arc<dyn Clock>,
    settings: OfflineSettings,
    resources: Vec<Resource>,
    connections: Vec<Connection>,
    organization: Organization,
    knowledge_bases: Mutex<Vec<KnowledgeBase>>,
    deferred: Mutex<Vec<DeferredWrite>>,
}

impl OfflineRepository {
    pub fn new(store: MembershipStore, clock: Arc<dyn Clock>, settings: OfflineSettings) -> Self {
        debug!(
            "OfflineRepository over {:?} (latency {:?}, apply delay {:?})",
            store.path(),
            settings.latency,
            settings.apply_delay
        );
        Self {
            store,
            clock,
            settings,
            resources: mock_data::resources(),
            connections: mock_data::connections(),
            organization: mock_data::organization(),
            knowledge_bases: Mutex::new(mock_data::knowledge_bases()),
            deferred: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &MembershipStore {
        &self.store
    }

    pub fn settings(&self) -> &OfflineSettings {
        &self.settings
    }

    /// Number of writes still waiting for their apply delay.
    pub fn deferred_count(&self) -> usize {
        self.deferred.lock().map(|d| d.len()).unwrap_or(0)
    }

    /// Apply every deferred write whose delay has elapsed, in issue order.
    pub fn flush_due(&self) -> RepositoryResult<usize> {
        let now = self.clock.now();
        let due: Vec<Write> = {
            let mut deferred = lock(&self.deferred)?;
            let (due, waiting): (Vec<_>, Vec<_>) =
                deferred.drain(..).partition(|d| d.due <= now);
            *deferred = waiting;
            due.into_iter().map(|d| d.write).collect()
        };
        for write in &due {
            self.apply(write)?;
        }
        Ok(due.len())
    }

    fn apply(&self, write: &Write) -> RepositoryResult<()> {
        match write {
            Write::Add(resource) => {
                debug!("Offline membership: add {}", resource.path);
                self.store.add(resource).map_err(store_error)
            }
            Write::Remove(key) => {
                let removed = self.store.remove(key).map_err(store_error)?;
                debug!("Offline membership: remove {} (matched: {})", key, removed);
                Ok(())
            }
        }
    }

    fn defer(&self, write: Write) -> RepositoryResult<()> {
        if self.settings.apply_delay.is_zero() {
            return self.apply(&write);
        }
        let due = self.clock.now() + self.settings.apply_delay;
        lock(&self.deferred)?.push(DeferredWrite { due, write });
        Ok(())
    }

    /// Wait `delay`, then apply whatever became due meanwhile.
    async fn settle(&self, delay: Duration) -> RepositoryResult<()> {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.flush_due()?;
        Ok(())
    }

    /// A source resource plus, for directories, everything below it.
    fn expand_source(&self, id: &str) -> Vec<Resource> {
        let Some(root) = self.resources.iter().find(|r| r.resource_id.as_str() == id) else {
            return Vec::new();
        };
        let mut expanded = vec![root.clone()];
        expanded.extend(
            self.resources
                .iter()
                .filter(|r| r.is_descendant_of(root))
                .cloned(),
        );
        expanded
    }
}

fn lock<T>(mutex: &Mutex<T>) -> RepositoryResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| RepositoryError::Store(format!("offline state lock poisoned: {}", e)))
}

fn store_error(err: kbsync_store::StoreError) -> RepositoryError {
    RepositoryError::Store(err.to_string())
}

#[async_trait]
impl ResourceRepository for OfflineRepository {
    async fn list_connections(
        &self,
        _online: bool,
        _token: &str,
    ) -> RepositoryResult<Vec<Connection>> {
        self.settle(self.settings.latency).await?;
        Ok(self.connections.clone())
    }

    async fn list_resources(
        &self,
        _online: bool,
        _token: &str,
        connection_id: &str,
        parent_id: Option<&ResourceId>,
        search_term: Option<&str>,
        cursor: Option<&str>,
    ) -> RepositoryResult<Page<Resource>> {
        self.settle(self.settings.latency).await?;
        if !self.connections.iter().any(|c| c.connection_id == connection_id) {
            return Err(RepositoryError::Http {
                status: 404,
                message: format!("connection {} not found", connection_id),
            });
        }
        let matches = filter_listing(&self.resources, parent_id, search_term);
        Ok(paginate(matches, cursor, self.settings.page_size))
    }

    async fn get_current_organization(&self, _token: &str) -> RepositoryResult<Organization> {
        self.settle(self.settings.latency).await?;
        Ok(self.organization.clone())
    }

    async fn list_knowledge_bases(
        &self,
        _online: bool,
        _token: &str,
    ) -> RepositoryResult<Vec<KnowledgeBase>> {
        self.settle(self.settings.latency).await?;
        Ok(lock(&self.knowledge_bases)?.clone())
    }

    async fn create_knowledge_base(
        &self,
        _token: &str,
        connection_id: &str,
        resource_ids: &[ResourceId],
    ) -> RepositoryResult<KnowledgeBase> {
        self.settle(self.settings.latency).await?;
        let knowledge_base = KnowledgeBase {
            knowledge_base_id: uuid::Uuid::new_v4().to_string(),
            name: None,
            description: None,
            connection_id: Some(connection_id.to_string()),
            connection_source_ids: resource_ids.iter().map(|id| id.0.clone()).collect(),
            created_at: Some(Utc::now()),
        };
        debug!(
            "Offline knowledge base {} created over {} source(s)",
            knowledge_base.knowledge_base_id,
            resource_ids.len()
        );
        lock(&self.knowledge_bases)?.push(knowledge_base.clone());
        Ok(knowledge_base)
    }

    /// Index every source resource and everything below source directories.
    async fn sync_knowledge_base(
        &self,
        _token: &str,
        knowledge_base_id: &str,
        _org_id: &str,
    ) -> RepositoryResult<()> {
        self.settle(self.settings.sync_delay).await?;
        let sources = lock(&self.knowledge_bases)?
            .iter()
            .find(|kb| kb.knowledge_base_id == knowledge_base_id)
            .map(|kb| kb.connection_source_ids.clone())
            .ok_or_else(|| RepositoryError::Http {
                status: 404,
                message: format!("knowledge base {} not found", knowledge_base_id),
            })?;

        for id in &sources {
            for resource in self.expand_source(id) {
                self.defer(Write::Add(resource))?;
            }
        }
        Ok(())
    }

    async fn list_knowledge_base_resources(
        &self,
        _online: bool,
        _token: &str,
        _knowledge_base_id: &str,
        _path_filter: Option<&str>,
    ) -> RepositoryResult<Page<Resource>> {
        self.settle(self.settings.latency).await?;
        let resources = self.store.load().map_err(store_error)?;
        Ok(Page::single(resources))
    }

    async fn add_knowledge_base_resource(
        &self,
        _online: bool,
        _token: &str,
        _knowledge_base_id: &str,
        resource: &Resource,
    ) -> RepositoryResult<()> {
        self.settle(self.settings.ack_delay()).await?;
        self.defer(Write::Add(resource.clone()))
    }

    async fn remove_knowledge_base_resource(
        &self,
        _online: bool,
        _token: &str,
        _knowledge_base_id: &str,
        resource_path: &str,
    ) -> RepositoryResult<()> {
        self.settle(self.settings.ack_delay()).await?;
        self.defer(Write::Remove(resource_path.to_string()))
    }
}
