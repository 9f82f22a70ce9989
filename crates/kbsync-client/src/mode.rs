//! Routing between the HTTP backend and the offline repository.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use kbsync_core::{
    Clock, Connection, KnowledgeBase, Organization, Page, RepositoryError, RepositoryResult,
    Resource, ResourceId, ResourceRepository, SyncConfig, UnauthorizedSignal,
};
use kbsync_store::MembershipStore;

use crate::error::ClientResult;
use crate::http::HttpRepository;
use crate::offline::{OfflineRepository, OfflineSettings};

/// Dispatches every call by its `online` flag.
///
/// Organization lookup, creation and sync carry no flag and follow the
/// configured default mode.
#[derive(Debug)]
pub struct ModeRepository {
    http: Option<HttpRepository>,
    offline: OfflineRepository,
    default_online: bool,
}

impl ModeRepository {
    pub fn new(http: Option<HttpRepository>, offline: OfflineRepository, default_online: bool) -> Self {
        Self {
            http,
            offline,
            default_online,
        }
    }

    /// Build both repositories from the configuration.
    ///
    /// The HTTP side exists only when `backendUrl` is set.
    pub fn from_config(
        config: &SyncConfig,
        clock: Arc<dyn Clock>,
        unauthorized: UnauthorizedSignal,
    ) -> ClientResult<Self> {
        let http = config
            .backend_url
            .as_deref()
            .map(|url| HttpRepository::new(url, config.page_size, unauthorized))
            .transpose()?;
        let offline = OfflineRepository::new(
            MembershipStore::open(config.effective_store_path()),
            clock,
            OfflineSettings::from_config(config),
        );
        debug!(
            "ModeRepository: default {}, backend {}",
            if config.online { "online" } else { "offline" },
            if http.is_some() { "configured" } else { "absent" }
        );
        Ok(Self::new(http, offline, config.online))
    }

    pub fn offline(&self) -> &OfflineRepository {
        &self.offline
    }

    pub fn default_online(&self) -> bool {
        self.default_online
    }

    fn route(&self, online: bool) -> RepositoryResult<&dyn ResourceRepository> {
        if !online {
            return Ok(&self.offline as &dyn ResourceRepository);
        }
        match &self.http {
            Some(http) => Ok(http as &dyn ResourceRepository),
            None => Err(RepositoryError::MissingInput(
                "backendUrl (set it in the config or run with --offline)".to_string(),
            )),
        }
    }
}

#[async_trait]
impl ResourceRepository for ModeRepository {
    async fn list_connections(
        &self,
        online: bool,
        token: &str,
    ) -> RepositoryResult<Vec<Connection>> {
        self.route(online)?.list_connections(online, token).await
    }

    async fn list_resources(
        &self,
        online: bool,
        token: &str,
        connection_id: &str,
        parent_id: Option<&ResourceId>,
        search_term: Option<&str>,
        cursor: Option<&str>,
    ) -> RepositoryResult<Page<Resource>> {
        self.route(online)?
            .list_resources(online, token, connection_id, parent_id, search_term, cursor)
            .await
    }

    async fn get_current_organization(&self, token: &str) -> RepositoryResult<Organization> {
        self.route(self.default_online)?
            .get_current_organization(token)
            .await
    }

    async fn list_knowledge_bases(
        &self,
        online: bool,
        token: &str,
    ) -> RepositoryResult<Vec<KnowledgeBase>> {
        self.route(online)?.list_knowledge_bases(online, token).await
    }

    async fn create_knowledge_base(
        &self,
        token: &str,
        connection_id: &str,
        resource_ids: &[ResourceId],
    ) -> RepositoryResult<KnowledgeBase> {
        self.route(self.default_online)?
            .create_knowledge_base(token, connection_id, resource_ids)
            .await
    }

    async fn sync_knowledge_base(
        &self,
        token: &str,
        knowledge_base_id: &str,
        org_id: &str,
    ) -> RepositoryResult<()> {
        self.route(self.default_online)?
            .sync_knowledge_base(token, knowledge_base_id, org_id)
            .await
    }

    async fn list_knowledge_base_resources(
        &self,
        online: bool,
        token: &str,
        knowledge_base_id: &str,
        path_filter: Option<&str>,
    ) -> RepositoryResult<Page<Resource>> {
        self.route(online)?
            .list_knowledge_base_resources(online, token, knowledge_base_id, path_filter)
            .await
    }

    async fn add_knowledge_base_resource(
        &self,
        online: bool,
        token: &str,
        knowledge_base_id: &str,
        resource: &Resource,
    ) -> RepositoryResult<()> {
        self.route(online)?
            .add_knowledge_base_resource(online, token, knowledge_base_id, resource)
            .await
    }

    async fn remove_knowledge_base_resource(
        &self,
        online: bool,
        token: &str,
        knowledge_base_id: &str,
        resource_path: &str,
    ) -> RepositoryResult<()> {
        self.route(online)?
            .remove_knowledge_base_resource(online, token, knowledge_base_id, resource_path)
            .await
    }
}
