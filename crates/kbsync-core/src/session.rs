//! Explorer session.
//!
//! [`ExplorerSession`] wires navigation, the query caches, reconciliation, the
//! orchestrator, and the timers into the surface a presentation layer drives:
//! it calls [`refresh`](ExplorerSession::refresh) to load whatever the current
//! state needs, renders [`view`](ExplorerSession::view), forwards user actions,
//! and calls [`tick`](ExplorerSession::tick) whenever a timer may be due.
//!
//! Everything runs on one task. Methods take `&mut self`, so fetch results are
//! always applied under the key that was current when they were requested.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_SEARCH_DEBOUNCE_MS};
use crate::debounce::Debouncer;
use crate::errors::SyncError;
use crate::navigation::{Breadcrumb, Navigation};
use crate::orchestrator::{CreateOutcome, MutationContext, MutationOrchestrator, ToggleOutcome};
use crate::poller::MembershipPoller;
use crate::query::{CacheEvent, ListingKey, MembershipKey, QueryCache, QueryKey, QueryLayer};
use crate::reconcile::{clear_confirmed, reconcile};
use crate::repository::{AuthContext, RepositoryResult, ResourceRepository};
use crate::scheduler::{Clock, Scheduler, TimerKind};
use crate::tree::ResourceIndex;
use crate::types::{Connection, KnowledgeBase, Page, Resource, ResourceId, ResourceView};

// ============================================================================
// Settings and reports
// ============================================================================

/// Timing of an explorer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub poll_interval: Duration,
    pub search_debounce: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
        }
    }
}

/// What a [`refresh`](ExplorerSession::refresh) did.
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Fetches that failed. Their previous cached values are still shown.
    pub errors: Vec<SyncError>,
    /// A fetch was rejected with 401 and the session token was dropped.
    pub unauthorized: bool,
    /// Number of pending entries confirmed by a membership refresh.
    pub confirmed: usize,
}

/// What a [`tick`](ExplorerSession::tick) did.
#[derive(Debug, Default)]
pub struct TickReport {
    /// The search term that settled, if it changed.
    pub search_settled: Option<String>,
    /// Membership was polled.
    pub polled: bool,
    pub confirmed: usize,
    pub errors: Vec<SyncError>,
    pub unauthorized: bool,
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerView {
    pub resources: Vec<ResourceView>,
    pub selected: Vec<ResourceId>,
    pub pending_count: usize,
    pub selection_count: usize,
    pub connection_id: Option<String>,
    pub knowledge_base_id: Option<String>,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub page_index: usize,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub search_term: String,
    pub debounced_search_term: String,
    pub is_loading: bool,
    pub listing_error: Option<String>,
    pub membership_error: Option<String>,
    pub is_polling: bool,
    pub is_creating_kb: bool,
}

// ============================================================================
// ExplorerSession
// ============================================================================

pub struct ExplorerSession {
    repository: Arc<dyn ResourceRepository>,
    auth: AuthContext,
    online: bool,
    scheduler: Scheduler,
    navigation: Navigation,
    debouncer: Debouncer,
    poller: MembershipPoller,
    queries: QueryLayer,
    orchestrator: MutationOrchestrator,
    connection_id: Option<String>,
    knowledge_base_id: Option<String>,
    knowledge_base_chosen: bool,
}

impl std::fmt::Debug for ExplorerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplorerSession")
            .field("online", &self.online)
            .field("connection_id", &self.connection_id)
            .field("knowledge_base_id", &self.knowledge_base_id)
            .field("navigation", &self.navigation)
            .field("pending", &self.orchestrator.pending().len())
            .finish_non_exhaustive()
    }
}

impl ExplorerSession {
    pub fn new(
        repository: Arc<dyn ResourceRepository>,
        auth: AuthContext,
        online: bool,
        settings: SessionSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            auth,
            online,
            scheduler: Scheduler::new(clock),
            navigation: Navigation::new(),
            debouncer: Debouncer::new(settings.search_debounce),
            poller: MembershipPoller::new(settings.poll_interval),
            queries: QueryLayer::new(),
            orchestrator: MutationOrchestrator::new(),
            connection_id: None,
            knowledge_base_id: None,
            knowledge_base_chosen: false,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn navigation(&self) -> &Navigation {
        &self.navigation
    }

    pub fn queries(&self) -> &QueryLayer {
        &self.queries
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CacheEvent> {
        self.queries.subscribe()
    }

    pub fn orchestrator(&self) -> &MutationOrchestrator {
        &self.orchestrator
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    pub fn knowledge_base_id(&self) -> Option<&str> {
        self.knowledge_base_id.as_deref()
    }

    pub fn connections(&self) -> &[Connection] {
        self.queries
            .connections
            .value(&self.online)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn knowledge_bases(&self) -> &[KnowledgeBase] {
        self.queries
            .knowledge_bases
            .value(&self.online)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_pending(&self) -> bool {
        !self.orchestrator.pending().is_empty()
    }

    /// Time until the next timer fires, if any is scheduled.
    pub fn next_timer_in(&self) -> Option<Duration> {
        self.scheduler.until_next()
    }

    fn listing_key(&self) -> Option<ListingKey> {
        Some(ListingKey {
            online: self.online,
            connection_id: self.connection_id.clone()?,
            directory: self.navigation.directory_key(),
            search: self
                .navigation
                .active_search()
                .unwrap_or_default()
                .to_string(),
            page: self.navigation.current_page_index(),
        })
    }

    fn membership_key(&self) -> Option<MembershipKey> {
        Some(MembershipKey {
            online: self.online,
            knowledge_base_id: self.knowledge_base_id.clone()?,
            path_filter: self.navigation.membership_path_filter(),
        })
    }

    fn current_listing(&self) -> Option<&Page<Resource>> {
        self.listing_key()
            .and_then(|key| self.queries.listings.value(&key))
    }

    fn current_membership(&self) -> &[Resource] {
        self.membership_key()
            .and_then(|key| self.queries.membership.value(&key))
            .map(|page| page.data.as_slice())
            .unwrap_or(&[])
    }

    // ------------------------------------------------------------------
    // View
    // ------------------------------------------------------------------

    /// Reconciled state of the current directory or search.
    pub fn view(&self) -> ExplorerView {
        let listing_key = self.listing_key();
        let listing_entry = listing_key
            .as_ref()
            .and_then(|key| self.queries.listings.entry(key));
        let membership_entry = self
            .membership_key()
            .and_then(|key| self.queries.membership.entry(&key));
        let listing = listing_entry.and_then(|entry| entry.value());
        let pending = self.orchestrator.pending();

        ExplorerView {
            resources: listing
                .map(|page| reconcile(&page.data, self.current_membership(), pending))
                .unwrap_or_default(),
            selected: self
                .orchestrator
                .selection()
                .resources()
                .iter()
                .map(|r| r.resource_id.clone())
                .collect(),
            pending_count: pending.len(),
            selection_count: self.orchestrator.selection().len(),
            connection_id: self.connection_id.clone(),
            knowledge_base_id: self.knowledge_base_id.clone(),
            breadcrumbs: self.navigation.breadcrumbs(),
            page_index: self.navigation.current_page_index(),
            has_next_page: listing.is_some_and(|page| page.next_cursor.is_some()),
            has_previous_page: self.navigation.has_previous_page(),
            search_term: self.navigation.search_term().to_string(),
            debounced_search_term: self.navigation.debounced_search_term().to_string(),
            is_loading: listing_key.is_some() && listing.is_none(),
            listing_error: listing_entry.and_then(|e| e.error()).map(str::to_string),
            membership_error: membership_entry.and_then(|e| e.error()).map(str::to_string),
            is_polling: self.poller.is_polling(),
            is_creating_kb: self.orchestrator.is_creating(),
        }
    }

    // ------------------------------------------------------------------
    // Fetching
    // ------------------------------------------------------------------

    /// Fetch every query the current state needs that is missing or stale.
    ///
    /// Connections, knowledge bases, and the organization load first and the
    /// first connection and knowledge base are adopted when none is chosen.
    /// The listing and membership for the current directory follow.
    pub async fn refresh(&mut self) -> RefreshReport {
        let mut report = RefreshReport::default();
        let Some(token) = self.auth.token().map(str::to_string) else {
            debug!("Not authenticated, skipping refresh");
            return report;
        };
        let repo = Arc::clone(&self.repository);
        let online = self.online;

        let need_org = self.queries.organization.needs_fetch(&online);
        let need_connections = self.queries.connections.needs_fetch(&online);
        let need_kbs = self.queries.knowledge_bases.needs_fetch(&online);

        let (organization, connections, knowledge_bases) = futures::join!(
            async {
                match need_org {
                    true => Some(repo.get_current_organization(&token).await),
                    false => None,
                }
            },
            async {
                match need_connections {
                    true => Some(repo.list_connections(online, &token).await),
                    false => None,
                }
            },
            async {
                match need_kbs {
                    true => Some(repo.list_knowledge_bases(online, &token).await),
                    false => None,
                }
            },
        );

        let now = self.scheduler.now();
        if let Some(result) = organization {
            let event = record(
                &mut self.queries.organization,
                online,
                QueryKey::Organization { online },
                result,
                now,
                &mut report.errors,
            );
            self.queries.notify(event);
        }
        if let Some(result) = connections {
            let event = record(
                &mut self.queries.connections,
                online,
                QueryKey::Connections { online },
                result,
                now,
                &mut report.errors,
            );
            self.queries.notify(event);
        }
        if let Some(result) = knowledge_bases {
            let event = record(
                &mut self.queries.knowledge_bases,
                online,
                QueryKey::KnowledgeBases { online },
                result,
                now,
                &mut report.errors,
            );
            self.queries.notify(event);
        }

        self.auto_select();

        let listing_key = self
            .listing_key()
            .filter(|key| self.queries.listings.needs_fetch(key));
        let membership_key = self
            .membership_key()
            .filter(|key| self.queries.membership.needs_fetch(key));
        let parent = self.navigation.current_directory_id().cloned();
        let cursor = self.navigation.current_cursor().map(str::to_string);

        let (listing, membership) = futures::join!(
            async {
                match &listing_key {
                    Some(key) => Some(
                        repo.list_resources(
                            online,
                            &token,
                            &key.connection_id,
                            parent.as_ref(),
                            (!key.search.is_empty()).then_some(key.search.as_str()),
                            cursor.as_deref(),
                        )
                        .await,
                    ),
                    None => None,
                }
            },
            async {
                match &membership_key {
                    Some(key) => Some(
                        repo.list_knowledge_base_resources(
                            online,
                            &token,
                            &key.knowledge_base_id,
                            Some(&key.path_filter),
                        )
                        .await,
                    ),
                    None => None,
                }
            },
        );

        let now = self.scheduler.now();
        if let (Some(key), Some(result)) = (listing_key, listing) {
            let event = record(
                &mut self.queries.listings,
                key.clone(),
                QueryKey::Listing(key),
                result,
                now,
                &mut report.errors,
            );
            self.queries.notify(event);
        }
        if let (Some(key), Some(result)) = (membership_key, membership) {
            report.confirmed += self.apply_membership(key, result, &mut report.errors);
        }

        report.unauthorized = self.check_unauthorized(&report.errors);
        self.sync_poller();
        report
    }

    /// Refetch the current membership regardless of staleness.
    async fn poll_membership(&mut self, errors: &mut Vec<SyncError>) -> usize {
        let (Some(token), Some(key)) = (self.auth.token().map(str::to_string), self.membership_key())
        else {
            return 0;
        };
        let result = self
            .repository
            .list_knowledge_base_resources(
                self.online,
                &token,
                &key.knowledge_base_id,
                Some(&key.path_filter),
            )
            .await;
        self.apply_membership(key, result, errors)
    }

    /// Store a membership result and run the pending-clear rule against it.
    fn apply_membership(
        &mut self,
        key: MembershipKey,
        result: RepositoryResult<Page<Resource>>,
        errors: &mut Vec<SyncError>,
    ) -> usize {
        let confirmed = match &result {
            Ok(page) => clear_confirmed(self.orchestrator.pending_mut(), &page.data).len(),
            Err(_) => 0,
        };
        let now = self.scheduler.now();
        let event = record(
            &mut self.queries.membership,
            key.clone(),
            QueryKey::Membership(key),
            result,
            now,
            errors,
        );
        self.queries.notify(event);
        confirmed
    }

    fn auto_select(&mut self) {
        if self.connection_id.is_none() {
            if let Some(first) = self.connections().first() {
                let id = first.connection_id.clone();
                debug!(connection = %id, "Auto-selecting first connection");
                self.select_connection(id);
            }
        }
        if self.knowledge_base_id.is_none() && !self.knowledge_base_chosen {
            if let Some(first) = self.knowledge_bases().first() {
                let id = first.knowledge_base_id.clone();
                debug!(knowledge_base = %id, "Auto-selecting first knowledge base");
                self.adopt_knowledge_base(Some(id));
            }
        }
    }

    fn check_unauthorized(&mut self, errors: &[SyncError]) -> bool {
        if errors.iter().any(SyncError::is_unauthorized) {
            warn!("Session token rejected, signing out");
            self.logout();
            true
        } else {
            false
        }
    }

    fn sync_poller(&mut self) {
        let has_pending = self.has_pending();
        self.poller.sync(
            &mut self.scheduler,
            has_pending,
            self.knowledge_base_id.as_deref(),
        );
    }

    fn arm_poller(&mut self) {
        self.sync_poller();
        self.poller.arm();
        self.sync_poller();
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Handle every timer that has come due.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        for (handle, kind) in self.scheduler.take_due() {
            match kind {
                TimerKind::SearchDebounce => {
                    if let Some(term) = self.debouncer.on_timer(handle) {
                        if self.navigation.apply_debounced_search(&term) {
                            debug!(term = %term, "Search term settled");
                            report.search_settled = Some(term);
                        }
                    }
                }
                TimerKind::MembershipPoll => {
                    if self.poller.on_timer(handle) {
                        debug!("Polling membership");
                        report.polled = true;
                        report.confirmed += self.poll_membership(&mut report.errors).await;
                    }
                }
            }
        }
        report.unauthorized = self.check_unauthorized(&report.errors);
        self.sync_poller();
        report
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Toggle a resource of the current listing.
    pub async fn toggle(&mut self, id: &ResourceId) -> Result<ToggleOutcome, SyncError> {
        let target = self
            .view()
            .resources
            .into_iter()
            .find(|view| &view.resource.resource_id == id)
            .ok_or_else(|| SyncError::ResourceNotFound(id.to_string()))?;
        let membership = self.current_membership().to_vec();
        let index = match &self.connection_id {
            Some(connection_id) => ResourceIndex::from_snapshot(
                self.queries.cached_resources(self.online, connection_id),
            ),
            None => ResourceIndex::default(),
        };

        let ctx = MutationContext {
            repository: self.repository.as_ref(),
            auth: &self.auth,
            online: self.online,
        };
        let outcome = self
            .orchestrator
            .toggle_resource(
                ctx,
                self.knowledge_base_id.as_deref(),
                &target,
                &index,
                &membership,
            )
            .await;

        if let ToggleOutcome::Dispatched(report) = &outcome {
            if report.succeeded() > 0 {
                if let Some(kb) = self.knowledge_base_id.clone() {
                    self.queries.invalidate_membership(&kb);
                }
            }
            self.check_unauthorized(&report.failures);
            self.arm_poller();
        }
        Ok(outcome)
    }

    /// Create a knowledge base from the selection, adopt it, and start indexing.
    pub async fn create_and_sync_knowledge_base(&mut self) -> Result<CreateOutcome, SyncError> {
        let org_id = self
            .queries
            .organization
            .value(&self.online)
            .map(|org| org.org_id.clone());
        let ctx = MutationContext {
            repository: self.repository.as_ref(),
            auth: &self.auth,
            online: self.online,
        };
        let result = self
            .orchestrator
            .create_and_sync_knowledge_base(ctx, self.connection_id.as_deref(), org_id.as_deref())
            .await;

        match &result {
            Ok(CreateOutcome::Created { knowledge_base, .. }) => {
                let id = knowledge_base.knowledge_base_id.clone();
                let now = self.scheduler.now();
                self.queries
                    .append_knowledge_base(self.online, knowledge_base.clone(), now);
                self.adopt_knowledge_base(Some(id.clone()));
                self.knowledge_base_chosen = true;
                self.debouncer.cancel(&mut self.scheduler);
                self.navigation.reset_to_root();
                self.queries.invalidate_membership(&id);
                self.arm_poller();
                info!(knowledge_base = %id, "Adopted new knowledge base");
            }
            Err(err) if err.is_unauthorized() => {
                self.logout();
            }
            _ => {}
        }
        result
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Enter a directory of the current listing.
    pub fn open_directory(&mut self, id: &ResourceId) -> Result<(), SyncError> {
        let resource = self
            .current_listing()
            .and_then(|page| page.data.iter().find(|r| &r.resource_id == id))
            .cloned()
            .ok_or_else(|| SyncError::ResourceNotFound(id.to_string()))?;
        if !resource.is_directory() {
            return Err(SyncError::NotADirectory(resource.path));
        }
        self.debouncer.cancel(&mut self.scheduler);
        self.navigation.descend(resource);
        Ok(())
    }

    /// Jump to breadcrumb `index`; `-1` is the root.
    pub fn jump_to_breadcrumb(&mut self, index: isize) {
        self.navigation.jump_to_breadcrumb(index);
    }

    /// Advance to the next page. Returns false on the last page.
    pub fn next_page(&mut self) -> bool {
        let next = self
            .current_listing()
            .and_then(|page| page.next_cursor.clone());
        self.navigation.advance_page(next.as_deref())
    }

    pub fn previous_page(&mut self) -> bool {
        self.navigation.retreat_page()
    }

    /// Record a keystroke in the search box; it settles after the debounce.
    pub fn set_search_term(&mut self, term: &str) {
        self.navigation.set_search_term(term);
        self.debouncer.input(&mut self.scheduler, term);
    }

    /// Switch connection. Navigation returns to the root.
    pub fn select_connection(&mut self, connection_id: String) {
        if self.connection_id.as_deref() == Some(connection_id.as_str()) {
            return;
        }
        info!(connection = %connection_id, "Connection selected");
        self.connection_id = Some(connection_id);
        self.navigation.reset_to_root();
    }

    /// Switch knowledge base (or clear it to build a new one from a selection).
    pub fn select_knowledge_base(&mut self, knowledge_base_id: Option<String>) {
        self.knowledge_base_chosen = true;
        self.adopt_knowledge_base(knowledge_base_id);
    }

    fn adopt_knowledge_base(&mut self, knowledge_base_id: Option<String>) {
        if self.knowledge_base_id == knowledge_base_id {
            return;
        }
        if let Some(id) = &knowledge_base_id {
            self.queries.invalidate_membership(id);
        }
        self.knowledge_base_id = knowledge_base_id;
        self.sync_poller();
    }

    // ------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------

    /// Drop the token and stop polling. Cached data stays until replaced.
    pub fn logout(&mut self) {
        self.auth.clear();
        self.debouncer.cancel(&mut self.scheduler);
        self.poller.sync(&mut self.scheduler, false, self.knowledge_base_id.as_deref());
    }
}

/// Store one fetch outcome and describe it as an event.
fn record<K, V>(
    cache: &mut QueryCache<K, V>,
    key: K,
    query: QueryKey,
    result: RepositoryResult<V>,
    now: Duration,
    errors: &mut Vec<SyncError>,
) -> CacheEvent
where
    K: Eq + Hash + Clone,
{
    match result {
        Ok(value) => {
            cache.store_ok(key, value, now);
            CacheEvent::Updated(query)
        }
        Err(err) => {
            warn!(query = %query, error = %err, "Fetch failed");
            cache.store_err(key, err.to_string());
            errors.push(SyncError::fetch(query.to_string(), &err));
            CacheEvent::Failed(query)
        }
    }
}
