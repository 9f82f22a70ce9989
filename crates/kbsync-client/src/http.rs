//! HTTP implementation of the repository API.
//!
//! Every request carries the bearer token. Reads and the sync trigger expect
//! `200`, resource-add expects `201` and resource-remove expects `204`; any
//! other status is an error. A `401` additionally raises the shared
//! [`UnauthorizedSignal`].
//!
//! URL shaping and status mapping live in free functions so they can be
//! tested without a server.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use kbsync_core::{
    Connection, KnowledgeBase, Organization, Page, RepositoryError, RepositoryResult, Resource,
    ResourceId, ResourceRepository, UnauthorizedSignal, DEFAULT_CONNECTION_PROVIDER,
};

use crate::error::{ClientError, ClientResult};

/// Longest response body echoed into an error message.
const MAX_ERROR_BODY: usize = 200;

// ============================================================================
// Status handling
// ============================================================================

/// Status codes a request accepts as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Exactly this status.
    Exactly(StatusCode),
    /// Any 2xx status.
    Success,
}

impl Expect {
    pub fn accepts(self, status: StatusCode) -> bool {
        match self {
            Self::Exactly(expected) => status == expected,
            Self::Success => status.is_success(),
        }
    }
}

/// Map a rejected status to a [`RepositoryError`].
pub fn status_error(status: StatusCode, what: &str, body: &str) -> RepositoryError {
    if status == StatusCode::UNAUTHORIZED {
        return RepositoryError::Unauthorized;
    }
    let body = body.trim();
    let message = if body.is_empty() {
        format!("{} failed", what)
    } else {
        let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{} failed: {}", what, snippet)
    };
    RepositoryError::Http {
        status: status.as_u16(),
        message,
    }
}

// ============================================================================
// URL shaping
// ============================================================================

/// Append `segments` to the path of `base` and `query` to its query string.
///
/// Segments are percent-encoded individually, so ids and paths containing
/// `/` or spaces stay a single segment.
pub fn endpoint(base: &Url, segments: &[&str], query: &[(&str, &str)]) -> RepositoryResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| RepositoryError::MissingInput(format!("base URL {} cannot carry a path", base)))?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

/// `GET /connections?connection_provider=gdrive`
pub fn connections_url(base: &Url) -> RepositoryResult<Url> {
    endpoint(
        base,
        &["connections"],
        &[("connection_provider", DEFAULT_CONNECTION_PROVIDER)],
    )
}

/// `GET /connections/{id}/resources/{children|search}`
///
/// Uses the search endpoint whenever a non-empty search term is given.
pub fn resources_url(
    base: &Url,
    connection_id: &str,
    parent_id: Option<&ResourceId>,
    search_term: Option<&str>,
    cursor: Option<&str>,
    limit: usize,
) -> RepositoryResult<Url> {
    let search_term = search_term.filter(|s| !s.is_empty());
    let leaf = if search_term.is_some() { "search" } else { "children" };
    let limit = limit.to_string();

    let mut query = vec![("limit", limit.as_str())];
    if let Some(parent) = parent_id {
        query.push(("resource_id", parent.as_str()));
    }
    if let Some(term) = search_term {
        query.push(("query", term));
    }
    if let Some(cursor) = cursor {
        query.push(("cursor", cursor));
    }
    endpoint(
        base,
        &["connections", connection_id, "resources", leaf],
        &query,
    )
}

/// `GET /organizations/me/current`
pub fn organization_url(base: &Url) -> RepositoryResult<Url> {
    endpoint(base, &["organizations", "me", "current"], &[])
}

/// `GET|POST /knowledge_bases`
pub fn knowledge_bases_url(base: &Url) -> RepositoryResult<Url> {
    endpoint(base, &["knowledge_bases"], &[])
}

/// `GET /knowledge_bases/sync/trigger/{kb}/{org}`
pub fn sync_url(base: &Url, knowledge_base_id: &str, org_id: &str) -> RepositoryResult<Url> {
    endpoint(
        base,
        &["knowledge_bases", "sync", "trigger", knowledge_base_id, org_id],
        &[],
    )
}

/// `GET /knowledge_bases/{kb}/resources/children?resource_path=...`
pub fn membership_url(
    base: &Url,
    knowledge_base_id: &str,
    path_filter: Option<&str>,
) -> RepositoryResult<Url> {
    let query: Vec<(&str, &str)> = path_filter
        .map(|path| vec![("resource_path", path)])
        .unwrap_or_default();
    endpoint(
        base,
        &["knowledge_bases", knowledge_base_id, "resources", "children"],
        &query,
    )
}

/// `POST /knowledge_bases/{kb}/resources`, or with `resource_path` set,
/// `DELETE /knowledge_bases/{kb}/resources?resource_id=<path>`.
pub fn knowledge_base_resources_url(
    base: &Url,
    knowledge_base_id: &str,
    resource_path: Option<&str>,
) -> RepositoryResult<Url> {
    let query: Vec<(&str, &str)> = resource_path
        .map(|path| vec![("resource_id", path)])
        .unwrap_or_default();
    endpoint(
        base,
        &["knowledge_bases", knowledge_base_id, "resources"],
        &query,
    )
}

// ============================================================================
// Request bodies
// ============================================================================

/// Body of `POST /knowledge_bases`.
#[derive(Debug, Serialize)]
pub struct CreateKnowledgeBaseRequest<'a> {
    pub connection_id: &'a str,
    pub connection_source_ids: &'a [ResourceId],
    pub indexing_params: IndexingParams,
}

/// Indexing parameters sent with every new knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexingParams {
    pub ocr: bool,
    pub unstructured: bool,
    pub embedding_params: EmbeddingParams,
    pub chunker_params: ChunkerParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingParams {
    pub embedding_model: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkerParams {
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub chunker: String,
}

impl Default for IndexingParams {
    fn default() -> Self {
        Self {
            ocr: false,
            unstructured: true,
            embedding_params: EmbeddingParams {
                embedding_model: "text-embedding-ada-002".to_string(),
                api_key: None,
            },
            chunker_params: ChunkerParams {
                chunk_size: 1500,
                chunk_overlap: 500,
                chunker: "sentence".to_string(),
            },
        }
    }
}

// ============================================================================
// HttpRepository
// ============================================================================

/// Repository API client over HTTP.
///
/// The `online` argument of the trait methods is ignored; routing between
/// modes is the job of [`crate::ModeRepository`].
#[derive(Debug, Clone)]
pub struct HttpRepository {
    client: reqwest::Client,
    base_url: Url,
    page_size: usize,
    unauthorized: UnauthorizedSignal,
}

impl HttpRepository {
    /// Create a client for the API rooted at `backend_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the URL does not parse or
    /// cannot carry path segments.
    pub fn new(
        backend_url: &str,
        page_size: usize,
        unauthorized: UnauthorizedSignal,
    ) -> ClientResult<Self> {
        let trimmed = backend_url.trim().trim_end_matches('/');
        let base_url =
            Url::parse(trimmed).map_err(|e| ClientError::invalid_url(backend_url, e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::invalid_url(
                backend_url,
                "URL cannot carry path segments",
            ));
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("kbsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::HttpClient(e.to_string()))?;

        debug!("HttpRepository rooted at {}", base_url);
        Ok(Self {
            client,
            base_url,
            page_size,
            unauthorized,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send `request`, map rejected statuses and raise the signal on 401.
    async fn execute(
        &self,
        request: RequestBuilder,
        expect: Expect,
        what: &str,
    ) -> RepositoryResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| RepositoryError::Transport(format!("{}: {}", what, e)))?;

        let status = response.status();
        debug!("{} -> {}", what, status);
        if expect.accepts(status) {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = status_error(status, what, &body);
        if err.is_unauthorized() {
            self.unauthorized.raise();
        }
        Err(err)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        token: &str,
        what: &str,
    ) -> RepositoryResult<T> {
        let request = self.client.get(url).bearer_auth(token);
        let response = self
            .execute(request, Expect::Exactly(StatusCode::OK), what)
            .await?;
        decode(response, what).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> RepositoryResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| RepositoryError::Decode(format!("{}: {}", what, e)))
}

#[async_trait]
impl ResourceRepository for HttpRepository {
    async fn list_connections(
        &self,
        _online: bool,
        token: &str,
    ) -> RepositoryResult<Vec<Connection>> {
        let url = connections_url(&self.base_url)?;
        self.get_json(url, token, "list connections").await
    }

    async fn list_resources(
        &self,
        _online: bool,
        token: &str,
        connection_id: &str,
        parent_id: Option<&ResourceId>,
        search_term: Option<&str>,
        cursor: Option<&str>,
    ) -> RepositoryResult<Page<Resource>> {
        let url = resources_url(
            &self.base_url,
            connection_id,
            parent_id,
            search_term,
            cursor,
            self.page_size,
        )?;
        self.get_json(url, token, "list resources").await
    }

    async fn get_current_organization(&self, token: &str) -> RepositoryResult<Organization> {
        let url = organization_url(&self.base_url)?;
        self.get_json(url, token, "fetch organization").await
    }

    async fn list_knowledge_bases(
        &self,
        _online: bool,
        token: &str,
    ) -> RepositoryResult<Vec<KnowledgeBase>> {
        let url = knowledge_bases_url(&self.base_url)?;
        self.get_json(url, token, "list knowledge bases").await
    }

    async fn create_knowledge_base(
        &self,
        token: &str,
        connection_id: &str,
        resource_ids: &[ResourceId],
    ) -> RepositoryResult<KnowledgeBase> {
        let body = CreateKnowledgeBaseRequest {
            connection_id,
            connection_source_ids: resource_ids,
            indexing_params: IndexingParams::default(),
        };
        let request = self
            .client
            .post(knowledge_bases_url(&self.base_url)?)
            .bearer_auth(token)
            .json(&body);
        let what = "create knowledge base";
        let response = self.execute(request, Expect::Success, what).await?;
        decode(response, what).await
    }

    async fn sync_knowledge_base(
        &self,
        token: &str,
        knowledge_base_id: &str,
        org_id: &str,
    ) -> RepositoryResult<()> {
        let request = self
            .client
            .get(sync_url(&self.base_url, knowledge_base_id, org_id)?)
            .bearer_auth(token);
        self.execute(
            request,
            Expect::Exactly(StatusCode::OK),
            "trigger knowledge base sync",
        )
        .await?;
        Ok(())
    }

    async fn list_knowledge_base_resources(
        &self,
        _online: bool,
        token: &str,
        knowledge_base_id: &str,
        path_filter: Option<&str>,
    ) -> RepositoryResult<Page<Resource>> {
        let url = membership_url(&self.base_url, knowledge_base_id, path_filter)?;
        self.get_json(url, token, "list knowledge base resources")
            .await
    }

    async fn add_knowledge_base_resource(
        &self,
        _online: bool,
        token: &str,
        knowledge_base_id: &str,
        resource: &Resource,
    ) -> RepositoryResult<()> {
        let request = self
            .client
            .post(knowledge_base_resources_url(
                &self.base_url,
                knowledge_base_id,
                None,
            )?)
            .bearer_auth(token)
            .json(&serde_json::json!({ "resource_id": resource.resource_id }));
        self.execute(
            request,
            Expect::Exactly(StatusCode::CREATED),
            "add resource to knowledge base",
        )
        .await?;
        Ok(())
    }

    async fn remove_knowledge_base_resource(
        &self,
        _online: bool,
        token: &str,
        knowledge_base_id: &str,
        resource_path: &str,
    ) -> RepositoryResult<()> {
        let request = self
            .client
            .delete(knowledge_base_resources_url(
                &self.base_url,
                knowledge_base_id,
                Some(resource_path),
            )?)
            .bearer_auth(token);
        self.execute(
            request,
            Expect::Exactly(StatusCode::NO_CONTENT),
            "remove resource from knowledge base",
        )
        .await?;
        Ok(())
    }
}
