//! Mutation orchestration.
//!
//! The [`MutationOrchestrator`] is the only writer of the pending map and the
//! selection set. It turns a user toggle into index/deindex calls (or a
//! selection change when no knowledge base exists yet) and drives the
//! create-then-sync flow for a new knowledge base.
//!
//! Pending entries are written before any request leaves the process, so the
//! next reconciliation already shows `Indexing`. Individual calls run
//! concurrently; a failed call leaves its pending entry in place. A failed
//! batch creation rolls the whole pending map back.

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::errors::SyncError;
use crate::pending::PendingMap;
use crate::reconcile::{membership_ids, status_of};
use crate::repository::{AuthContext, RepositoryError, ResourceRepository};
use crate::selection::{prune_ancestors, SelectionSet};
use crate::tree::ResourceIndex;
use crate::types::{
    IndexStatus, KnowledgeBase, PendingOperation, Resource, ResourceId, ResourceView,
};

// ============================================================================
// Inputs and outcomes
// ============================================================================

/// Everything a mutation needs to reach the repository.
#[derive(Clone, Copy)]
pub struct MutationContext<'a> {
    pub repository: &'a dyn ResourceRepository,
    pub auth: &'a AuthContext,
    pub online: bool,
}

/// Result of [`MutationOrchestrator::toggle_resource`].
#[derive(Debug)]
pub enum ToggleOutcome {
    /// The resource already has an operation in flight.
    Ignored,
    /// No knowledge base is active; the selection set changed.
    Selection { selected: bool },
    /// Calls were issued against the active knowledge base.
    Dispatched(DispatchReport),
}

/// Calls issued by one toggle and the ones that failed.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub issued: Vec<(ResourceId, PendingOperation)>,
    pub failures: Vec<SyncError>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.issued.len() - self.failures.len()
    }
}

/// Result of [`MutationOrchestrator::create_and_sync_knowledge_base`].
#[derive(Debug)]
pub enum CreateOutcome {
    /// The knowledge base was created and indexing was triggered.
    Created {
        knowledge_base: KnowledgeBase,
        resource_ids: Vec<ResourceId>,
    },
    /// A precondition was not met; nothing was sent.
    Skipped { reason: String },
}

// ============================================================================
// Planning
// ============================================================================

/// Operations a toggle of `target` should issue.
///
/// The operation is chosen from the target's own status: `Indexed` becomes a
/// deindex, anything else an index. For a directory every known descendant
/// whose status differs from the outcome is included, except those already
/// `Indexing`. Returns nothing for a target that is itself `Indexing`.
pub fn plan_toggle(
    target: &Resource,
    target_status: IndexStatus,
    index: &ResourceIndex,
    status: impl Fn(&ResourceId) -> IndexStatus,
) -> Vec<(Resource, PendingOperation)> {
    if target_status == IndexStatus::Indexing {
        return Vec::new();
    }
    let op = match target_status {
        IndexStatus::Indexed => PendingOperation::Deindex,
        _ => PendingOperation::Index,
    };
    let outcome = op.target_status();

    let mut plan = vec![(target.clone(), op)];
    if target.is_directory() {
        plan.extend(
            index
                .descendants(&target.resource_id)
                .into_iter()
                .filter(|child| {
                    let current = status(&child.resource_id);
                    current != IndexStatus::Indexing && current != outcome
                })
                .map(|child| (child.clone(), op)),
        );
    }
    plan
}

// ============================================================================
// MutationOrchestrator
// ============================================================================

#[derive(Debug, Default)]
pub struct MutationOrchestrator {
    pending: PendingMap,
    selection: SelectionSet,
    creating: bool,
}

impl MutationOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &PendingMap {
        &self.pending
    }

    /// Mutable access for the pending-clear rule run on membership refresh.
    pub fn pending_mut(&mut self) -> &mut PendingMap {
        &mut self.pending
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// True while a create-and-sync flow is in flight.
    pub fn is_creating(&self) -> bool {
        self.creating
    }

    /// Toggle one resource.
    ///
    /// `index` is the cached snapshot used to find descendants and
    /// `membership` the current membership snapshot used for their status.
    pub async fn toggle_resource(
        &mut self,
        ctx: MutationContext<'_>,
        knowledge_base_id: Option<&str>,
        target: &ResourceView,
        index: &ResourceIndex,
        membership: &[Resource],
    ) -> ToggleOutcome {
        if target.status == IndexStatus::Indexing {
            debug!(resource = %target.resource.resource_id, "Toggle ignored, operation in flight");
            return ToggleOutcome::Ignored;
        }

        let Some(knowledge_base_id) = knowledge_base_id else {
            let selected = self.selection.toggle(&target.resource);
            debug!(
                resource = %target.resource.resource_id,
                selected,
                total = self.selection.len(),
                "Selection toggled"
            );
            return ToggleOutcome::Selection { selected };
        };

        let member_ids = membership_ids(membership);
        let plan = plan_toggle(&target.resource, target.status, index, |id| {
            status_of(id, &member_ids, &self.pending)
        });

        for (resource, op) in &plan {
            self.pending.mark(resource.resource_id.clone(), *op);
        }
        info!(
            knowledge_base = knowledge_base_id,
            resource = %target.resource.resource_id,
            operations = plan.len(),
            "Dispatching toggle"
        );

        ToggleOutcome::Dispatched(dispatch(ctx, knowledge_base_id, &plan).await)
    }

    /// Create a knowledge base over the pruned selection and trigger indexing.
    ///
    /// On success the selection is consumed and the pruned resources stay
    /// pending until membership confirms them. On failure the entire pending
    /// map is cleared and no knowledge base is returned.
    pub async fn create_and_sync_knowledge_base(
        &mut self,
        ctx: MutationContext<'_>,
        connection_id: Option<&str>,
        org_id: Option<&str>,
    ) -> Result<CreateOutcome, SyncError> {
        let (Some(connection_id), Some(org_id)) = (connection_id, org_id) else {
            return Ok(skip("connection or organization not loaded"));
        };
        if self.selection.is_empty() {
            return Ok(skip("no resources selected"));
        }
        let Ok(token) = ctx.auth.require_token() else {
            return Ok(skip("not authenticated"));
        };

        let roots = prune_ancestors(self.selection.resources());
        let resource_ids: Vec<ResourceId> =
            roots.iter().map(|r| r.resource_id.clone()).collect();
        for id in &resource_ids {
            self.pending.mark(id.clone(), PendingOperation::Index);
        }

        self.creating = true;
        let result = async {
            let kb = ctx
                .repository
                .create_knowledge_base(token, connection_id, &resource_ids)
                .await?;
            ctx.repository
                .sync_knowledge_base(token, &kb.knowledge_base_id, org_id)
                .await?;
            Ok::<_, RepositoryError>(kb)
        }
        .await;
        self.creating = false;

        match result {
            Ok(knowledge_base) => {
                info!(
                    knowledge_base = %knowledge_base.knowledge_base_id,
                    resources = resource_ids.len(),
                    "Knowledge base created and sync triggered"
                );
                self.selection.clear();
                Ok(CreateOutcome::Created {
                    knowledge_base,
                    resource_ids,
                })
            }
            Err(err) => {
                error!(error = %err, "Knowledge base creation failed, rolling back");
                self.pending.clear();
                Err(SyncError::BatchCreation {
                    message: err.to_string(),
                })
            }
        }
    }
}

fn skip(reason: &str) -> CreateOutcome {
    let err = SyncError::Precondition(reason.to_string());
    warn!("{}", err);
    CreateOutcome::Skipped {
        reason: reason.to_string(),
    }
}

/// Issue every planned call concurrently.
async fn dispatch(
    ctx: MutationContext<'_>,
    knowledge_base_id: &str,
    plan: &[(Resource, PendingOperation)],
) -> DispatchReport {
    let calls = plan.iter().map(|(resource, op)| async move {
        let result = match ctx.auth.require_token() {
            Err(err) => Err(err),
            Ok(token) => match op {
                PendingOperation::Index => {
                    ctx.repository
                        .add_knowledge_base_resource(ctx.online, token, knowledge_base_id, resource)
                        .await
                }
                PendingOperation::Deindex => {
                    ctx.repository
                        .remove_knowledge_base_resource(
                            ctx.online,
                            token,
                            knowledge_base_id,
                            &resource.path,
                        )
                        .await
                }
            },
        };
        (resource, *op, result)
    });

    let mut report = DispatchReport::default();
    for (resource, op, result) in join_all(calls).await {
        report.issued.push((resource.resource_id.clone(), op));
        if let Err(err) = result {
            warn!(resource = %resource.resource_id, operation = %op, error = %err, "Mutation failed");
            report.failures.push(SyncError::Mutation {
                resource_id: resource.resource_id.clone(),
                operation: op,
                message: err.to_string(),
            });
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile;
    use crate::testing::{scenario_tree, FakeCall, FakeOp, FakeRepository};

    fn auth() -> AuthContext {
        AuthContext::with_token("tok")
    }

    fn ctx<'a>(repo: &'a FakeRepository, auth: &'a AuthContext) -> MutationContext<'a> {
        MutationContext {
            repository: repo,
            auth,
            online: false,
        }
    }

    fn view_of(views: &[ResourceView], id: &str) -> ResourceView {
        views
            .iter()
            .find(|v| v.resource.resource_id.as_str() == id)
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_toggle_directory_indexes_descendants() {
        let repo = FakeRepository::new();
        let auth = auth();
        let tree = scenario_tree();
        let index = ResourceIndex::from_snapshot(&tree);
        let mut orch = MutationOrchestrator::new();

        let views = reconcile(&tree, &[], orch.pending());
        assert!(views.iter().all(|v| v.status == IndexStatus::NotIndexed));

        let outcome = orch
            .toggle_resource(ctx(&repo, &auth), Some("kb"), &view_of(&views, "dirA"), &index, &[])
            .await;

        let ToggleOutcome::Dispatched(report) = outcome else {
            panic!("expected dispatch");
        };
        assert_eq!(report.succeeded(), 2);
        let pending: Vec<(&str, PendingOperation)> = orch
            .pending()
            .iter()
            .map(|(id, op)| (id.as_str(), op))
            .collect();
        assert_eq!(
            pending,
            vec![
                ("dirA", PendingOperation::Index),
                ("file1", PendingOperation::Index)
            ]
        );

        let views = reconcile(&tree, &[], orch.pending());
        assert_eq!(view_of(&views, "dirA").status, IndexStatus::Indexing);
        assert_eq!(view_of(&views, "file1").status, IndexStatus::Indexing);
        assert_eq!(view_of(&views, "file2").status, IndexStatus::NotIndexed);
    }

    #[tokio::test]
    async fn test_toggle_skips_descendants_already_at_target() {
        let repo = FakeRepository::new();
        let auth = auth();
        let tree = vec![
            Resource::directory("dirA", "dirA"),
            Resource::file("f1", "dirA/f1").with_parent("dirA"),
            Resource::file("f2", "dirA/f2").with_parent("dirA"),
            Resource::file("f3", "dirA/f3").with_parent("dirA"),
        ];
        let membership = vec![tree[2].clone()];
        let index = ResourceIndex::from_snapshot(&tree);
        let mut orch = MutationOrchestrator::new();
        orch.pending_mut().mark("f3".into(), PendingOperation::Deindex);

        let views = reconcile(&tree, &membership, orch.pending());
        orch.toggle_resource(
            ctx(&repo, &auth),
            Some("kb"),
            &view_of(&views, "dirA"),
            &index,
            &membership,
        )
        .await;

        assert_eq!(repo.count(FakeOp::Add), 2);
        let adds: Vec<FakeCall> = repo
            .calls()
            .into_iter()
            .filter(|c| matches!(c, FakeCall::Add { .. }))
            .collect();
        assert!(adds.contains(&FakeCall::Add { resource_id: "dirA".into() }));
        assert!(adds.contains(&FakeCall::Add { resource_id: "f1".into() }));
        // f3 keeps its original operation
        assert_eq!(orch.pending().get(&"f3".into()), Some(PendingOperation::Deindex));
    }

    #[tokio::test]
    async fn test_toggle_indexed_file_deindexes_by_path() {
        let repo = FakeRepository::new();
        let auth = auth();
        let tree = scenario_tree();
        let membership = vec![tree[2].clone()];
        let mut orch = MutationOrchestrator::new();

        let views = reconcile(&tree, &membership, orch.pending());
        orch.toggle_resource(
            ctx(&repo, &auth),
            Some("kb"),
            &view_of(&views, "file2"),
            &ResourceIndex::default(),
            &membership,
        )
        .await;

        assert_eq!(
            repo.calls(),
            vec![FakeCall::Remove { path: "file2".into() }]
        );
        assert_eq!(
            orch.pending().get(&"file2".into()),
            Some(PendingOperation::Deindex)
        );
    }

    #[tokio::test]
    async fn test_toggle_indexing_resource_is_ignored() {
        let repo = FakeRepository::new();
        let auth = auth();
        let tree = scenario_tree();
        let mut orch = MutationOrchestrator::new();
        orch.pending_mut().mark("file2".into(), PendingOperation::Index);

        let views = reconcile(&tree, &[], orch.pending());
        let outcome = orch
            .toggle_resource(
                ctx(&repo, &auth),
                Some("kb"),
                &view_of(&views, "file2"),
                &ResourceIndex::default(),
                &[],
            )
            .await;

        assert!(matches!(outcome, ToggleOutcome::Ignored));
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_call_keeps_pending_entry() {
        let repo = FakeRepository::new();
        repo.fail_resource("file1");
        let auth = auth();
        let tree = scenario_tree();
        let index = ResourceIndex::from_snapshot(&tree);
        let mut orch = MutationOrchestrator::new();

        let views = reconcile(&tree, &[], orch.pending());
        let outcome = orch
            .toggle_resource(ctx(&repo, &auth), Some("kb"), &view_of(&views, "dirA"), &index, &[])
            .await;

        let ToggleOutcome::Dispatched(report) = outcome else {
            panic!("expected dispatch");
        };
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            &report.failures[0],
            SyncError::Mutation { resource_id, .. } if resource_id.as_str() == "file1"
        ));
        assert!(orch.pending().contains(&"file1".into()));
        assert!(orch.pending().contains(&"dirA".into()));
    }

    #[tokio::test]
    async fn test_toggle_without_kb_changes_selection_only() {
        let repo = FakeRepository::new();
        let auth = auth();
        let tree = scenario_tree();
        let mut orch = MutationOrchestrator::new();

        let views = reconcile(&tree, &[], orch.pending());
        let outcome = orch
            .toggle_resource(
                ctx(&repo, &auth),
                None,
                &view_of(&views, "dirA"),
                &ResourceIndex::default(),
                &[],
            )
            .await;

        assert!(matches!(outcome, ToggleOutcome::Selection { selected: true }));
        assert_eq!(orch.selection().len(), 1);
        assert!(orch.pending().is_empty());
        assert!(repo.calls().is_empty());
    }

    async fn select_all(orch: &mut MutationOrchestrator, repo: &FakeRepository, auth: &AuthContext) {
        let tree = scenario_tree();
        let views = reconcile(&tree, &[], orch.pending());
        for id in ["dirA", "file1"] {
            orch.toggle_resource(
                ctx(repo, auth),
                None,
                &view_of(&views, id),
                &ResourceIndex::default(),
                &[],
            )
            .await;
        }
    }

    #[tokio::test]
    async fn test_create_sends_pruned_ids() {
        let repo = FakeRepository::new();
        let auth = auth();
        let mut orch = MutationOrchestrator::new();
        select_all(&mut orch, &repo, &auth).await;

        let outcome = orch
            .create_and_sync_knowledge_base(ctx(&repo, &auth), Some("conn-1"), Some("org-1"))
            .await
            .unwrap();

        let CreateOutcome::Created { knowledge_base, resource_ids } = outcome else {
            panic!("expected creation");
        };
        assert_eq!(resource_ids, vec![ResourceId::from("dirA")]);
        assert!(repo.calls().contains(&FakeCall::CreateKnowledgeBase {
            resource_ids: vec!["dirA".to_string()]
        }));
        assert!(repo.calls().contains(&FakeCall::SyncKnowledgeBase {
            knowledge_base_id: knowledge_base.knowledge_base_id.clone()
        }));
        assert!(orch.selection().is_empty());
        assert_eq!(orch.pending().get(&"dirA".into()), Some(PendingOperation::Index));
        assert!(!orch.is_creating());
    }

    #[tokio::test]
    async fn test_sync_failure_rolls_back_pending() {
        let repo = FakeRepository::new();
        repo.fail(
            FakeOp::SyncKnowledgeBase,
            RepositoryError::Http {
                status: 500,
                message: "sync failed".into(),
            },
        );
        let auth = auth();
        let mut orch = MutationOrchestrator::new();
        orch.pending_mut().mark("unrelated".into(), PendingOperation::Deindex);
        select_all(&mut orch, &repo, &auth).await;

        let err = orch
            .create_and_sync_knowledge_base(ctx(&repo, &auth), Some("conn-1"), Some("org-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::BatchCreation { .. }));
        assert!(orch.pending().is_empty());
        assert_eq!(orch.selection().len(), 2);
        assert!(!orch.is_creating());
    }

    #[tokio::test]
    async fn test_create_with_empty_selection_is_skipped() {
        let repo = FakeRepository::new();
        let auth = auth();
        let mut orch = MutationOrchestrator::new();

        let outcome = orch
            .create_and_sync_knowledge_base(ctx(&repo, &auth), Some("conn-1"), Some("org-1"))
            .await
            .unwrap();

        assert!(matches!(outcome, CreateOutcome::Skipped { .. }));
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_without_organization_is_skipped() {
        let repo = FakeRepository::new();
        let auth = auth();
        let mut orch = MutationOrchestrator::new();
        select_all(&mut orch, &repo, &auth).await;

        let outcome = orch
            .create_and_sync_knowledge_base(ctx(&repo, &auth), Some("conn-1"), None)
            .await
            .unwrap();

        assert!(matches!(outcome, CreateOutcome::Skipped { .. }));
        assert!(orch.pending().is_empty());
        assert_eq!(orch.selection().len(), 2);
    }
}
