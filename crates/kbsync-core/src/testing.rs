//! In-memory repository for unit tests.
//!
//! Index and deindex calls succeed immediately but only reach membership when
//! [`FakeRepository::settle`] is called, which mimics the backend indexing in
//! the background. Any call kind can be scripted to fail.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::repository::{RepositoryError, RepositoryResult, ResourceRepository};
use crate::types::{
    Connection, KnowledgeBase, Organization, Page, PendingOperation, Resource, ResourceId,
};

/// Kind of repository call, used to script failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    ListConnections,
    ListResources,
    GetOrganization,
    ListKnowledgeBases,
    CreateKnowledgeBase,
    SyncKnowledgeBase,
    ListMembership,
    Add,
    Remove,
}

/// A recorded call with its interesting arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    ListConnections,
    ListResources {
        parent: Option<String>,
        search: Option<String>,
        cursor: Option<String>,
    },
    GetOrganization,
    ListKnowledgeBases,
    CreateKnowledgeBase { resource_ids: Vec<String> },
    SyncKnowledgeBase { knowledge_base_id: String },
    ListMembership { knowledge_base_id: String },
    Add { resource_id: String },
    Remove { path: String },
}

impl FakeCall {
    fn op(&self) -> FakeOp {
        match self {
            Self::ListConnections => FakeOp::ListConnections,
            Self::ListResources { .. } => FakeOp::ListResources,
            Self::GetOrganization => FakeOp::GetOrganization,
            Self::ListKnowledgeBases => FakeOp::ListKnowledgeBases,
            Self::CreateKnowledgeBase { .. } => FakeOp::CreateKnowledgeBase,
            Self::SyncKnowledgeBase { .. } => FakeOp::SyncKnowledgeBase,
            Self::ListMembership { .. } => FakeOp::ListMembership,
            Self::Add { .. } => FakeOp::Add,
            Self::Remove { .. } => FakeOp::Remove,
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    connections: Vec<Connection>,
    resources: Vec<Resource>,
    organization: Option<Organization>,
    knowledge_bases: Vec<KnowledgeBase>,
    membership: Vec<Resource>,
    deferred: Vec<(PendingOperation, Resource)>,
    failures: HashMap<FakeOp, RepositoryError>,
    failing_resources: HashSet<ResourceId>,
    calls: Vec<FakeCall>,
    page_size: Option<usize>,
}

#[derive(Debug, Default)]
pub struct FakeRepository {
    state: Mutex<FakeState>,
}

pub fn connection(id: &str) -> Connection {
    Connection {
        connection_id: id.to_string(),
        name: format!("Connection {}", id),
        connection_provider: "gdrive".to_string(),
        created_at: None,
        updated_at: None,
    }
}

pub fn knowledge_base(id: &str) -> KnowledgeBase {
    KnowledgeBase {
        knowledge_base_id: id.to_string(),
        name: Some(format!("KB {}", id)),
        description: None,
        connection_id: None,
        connection_source_ids: Vec::new(),
        created_at: None,
    }
}

/// `[dirA, dirA/file1, file2]`, the tree used across the scenario tests.
pub fn scenario_tree() -> Vec<Resource> {
    vec![
        Resource::directory("dirA", "dirA"),
        Resource::file("file1", "dirA/file1").with_parent("dirA"),
        Resource::file("file2", "file2"),
    ]
}

impl FakeRepository {
    /// One connection (`conn-1`), one organization (`org-1`), no knowledge bases.
    pub fn new() -> Self {
        let repo = Self::default();
        {
            let mut state = repo.state.lock().unwrap();
            state.connections = vec![connection("conn-1")];
            state.organization = Some(Organization {
                org_id: "org-1".to_string(),
                name: None,
            });
        }
        repo
    }

    pub fn with_resources(self, resources: Vec<Resource>) -> Self {
        self.state.lock().unwrap().resources = resources;
        self
    }

    pub fn with_knowledge_base(self, id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .knowledge_bases
            .push(knowledge_base(id));
        self
    }

    pub fn with_membership(self, membership: Vec<Resource>) -> Self {
        self.state.lock().unwrap().membership = membership;
        self
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state.lock().unwrap().page_size = Some(page_size);
        self
    }

    /// Make every call of `op` fail with `err`.
    pub fn fail(&self, op: FakeOp, err: RepositoryError) {
        self.state.lock().unwrap().failures.insert(op, err);
    }

    /// Make add/remove calls for one resource fail.
    pub fn fail_resource(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_resources
            .insert(ResourceId::from(id));
    }

    /// Apply every deferred add/remove to membership.
    pub fn settle(&self) {
        let mut state = self.state.lock().unwrap();
        let deferred = std::mem::take(&mut state.deferred);
        for (op, resource) in deferred {
            match op {
                PendingOperation::Index => {
                    if !state
                        .membership
                        .iter()
                        .any(|r| r.resource_id == resource.resource_id)
                    {
                        state.membership.push(resource);
                    }
                }
                PendingOperation::Deindex => state.membership.retain(|r| r.path != resource.path),
            }
        }
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: FakeOp) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.op() == op)
            .count()
    }

    fn begin(&self, call: FakeCall) -> RepositoryResult<std::sync::MutexGuard<'_, FakeState>> {
        let mut state = self.state.lock().unwrap();
        let op = call.op();
        state.calls.push(call);
        if let Some(err) = state.failures.get(&op).cloned() {
            return Err(err);
        }
        Ok(state)
    }

    fn paginate(
        items: Vec<Resource>,
        page_size: Option<usize>,
        cursor: Option<&str>,
    ) -> Page<Resource> {
        let Some(size) = page_size else {
            return Page::single(items);
        };
        let offset = cursor
            .and_then(|c| c.strip_prefix("cursor-"))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);
        let end = (offset + size).min(items.len());
        Page {
            data: items.get(offset..end).map(<[Resource]>::to_vec).unwrap_or_default(),
            next_cursor: (end < items.len()).then(|| format!("cursor-{}", end)),
            current_cursor: cursor.map(str::to_string),
        }
    }
}

#[async_trait]
impl ResourceRepository for FakeRepository {
    async fn list_connections(
        &self,
        _online: bool,
        _token: &str,
    ) -> RepositoryResult<Vec<Connection>> {
        let state = self.begin(FakeCall::ListConnections)?;
        Ok(state.connections.clone())
    }

    async fn list_resources(
        &self,
        _online: bool,
        _token: &str,
        _connection_id: &str,
        parent_id: Option<&ResourceId>,
        search_term: Option<&str>,
        cursor: Option<&str>,
    ) -> RepositoryResult<Page<Resource>> {
        let state = self.begin(FakeCall::ListResources {
            parent: parent_id.map(|p| p.to_string()),
            search: search_term.map(str::to_string),
            cursor: cursor.map(str::to_string),
        })?;
        let items: Vec<Resource> = match search_term {
            Some(term) => {
                let needle = term.to_lowercase();
                state
                    .resources
                    .iter()
                    .filter(|r| r.path.to_lowercase().contains(&needle))
                    .cloned()
                    .collect()
            }
            None => state
                .resources
                .iter()
                .filter(|r| r.parent_id.as_ref() == parent_id)
                .cloned()
                .collect(),
        };
        Ok(Self::paginate(items, state.page_size, cursor))
    }

    async fn get_current_organization(&self, _token: &str) -> RepositoryResult<Organization> {
        let state = self.begin(FakeCall::GetOrganization)?;
        state.organization.clone().ok_or(RepositoryError::Http {
            status: 404,
            message: "no organization".to_string(),
        })
    }

    async fn list_knowledge_bases(
        &self,
        _online: bool,
        _token: &str,
    ) -> RepositoryResult<Vec<KnowledgeBase>> {
        let state = self.begin(FakeCall::ListKnowledgeBases)?;
        Ok(state.knowledge_bases.clone())
    }

    async fn create_knowledge_base(
        &self,
        _token: &str,
        connection_id: &str,
        resource_ids: &[ResourceId],
    ) -> RepositoryResult<KnowledgeBase> {
        let mut state = self.begin(FakeCall::CreateKnowledgeBase {
            resource_ids: resource_ids.iter().map(|id| id.to_string()).collect(),
        })?;
        let mut kb = knowledge_base(&format!("kb-new-{}", state.knowledge_bases.len() + 1));
        kb.connection_id = Some(connection_id.to_string());
        kb.connection_source_ids = resource_ids.iter().map(|id| id.to_string()).collect();
        state.knowledge_bases.push(kb.clone());
        Ok(kb)
    }

    async fn sync_knowledge_base(
        &self,
        _token: &str,
        knowledge_base_id: &str,
        _org_id: &str,
    ) -> RepositoryResult<()> {
        self.begin(FakeCall::SyncKnowledgeBase {
            knowledge_base_id: knowledge_base_id.to_string(),
        })?;
        Ok(())
    }

    async fn list_knowledge_base_resources(
        &self,
        _online: bool,
        _token: &str,
        knowledge_base_id: &str,
        _path_filter: Option<&str>,
    ) -> RepositoryResult<Page<Resource>> {
        let state = self.begin(FakeCall::ListMembership {
            knowledge_base_id: knowledge_base_id.to_string(),
        })?;
        Ok(Page::single(state.membership.clone()))
    }

    async fn add_knowledge_base_resource(
        &self,
        _online: bool,
        _token: &str,
        _knowledge_base_id: &str,
        resource: &Resource,
    ) -> RepositoryResult<()> {
        let mut state = self.begin(FakeCall::Add {
            resource_id: resource.resource_id.to_string(),
        })?;
        if state.failing_resources.contains(&resource.resource_id) {
            return Err(RepositoryError::Http {
                status: 500,
                message: "indexing rejected".to_string(),
            });
        }
        state
            .deferred
            .push((PendingOperation::Index, resource.clone()));
        Ok(())
    }

    async fn remove_knowledge_base_resource(
        &self,
        _online: bool,
        _token: &str,
        _knowledge_base_id: &str,
        resource_path: &str,
    ) -> RepositoryResult<()> {
        let mut state = self.begin(FakeCall::Remove {
            path: resource_path.to_string(),
        })?;
        let target = state
            .membership
            .iter()
            .chain(state.resources.iter())
            .find(|r| r.path == resource_path)
            .cloned()
            .unwrap_or_else(|| Resource::file(resource_path, resource_path));
        if state.failing_resources.contains(&target.resource_id) {
            return Err(RepositoryError::Http {
                status: 500,
                message: "removal rejected".to_string(),
            });
        }
        state.deferred.push((PendingOperation::Deindex, target));
        Ok(())
    }
}
