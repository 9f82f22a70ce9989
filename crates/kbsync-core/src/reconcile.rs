//! Status reconciliation.
//!
//! Combines three independently changing views of the same resources into one
//! display status per resource:
//!
//! - the directory listing (what exists),
//! - the knowledge-base membership snapshot (what the backend has indexed),
//! - the pending map (what this client asked for and has not seen confirmed).
//!
//! Precedence is pending, then membership, then not indexed. Everything here
//! is pure so the same inputs always give the same output.

use std::collections::HashSet;

use crate::pending::PendingMap;
use crate::types::{IndexStatus, PendingOperation, Resource, ResourceId, ResourceView};

/// Ids present in a membership snapshot.
pub fn membership_ids(membership: &[Resource]) -> HashSet<&ResourceId> {
    membership.iter().map(|r| &r.resource_id).collect()
}

/// Status of a single resource.
pub fn status_of(
    id: &ResourceId,
    membership: &HashSet<&ResourceId>,
    pending: &PendingMap,
) -> IndexStatus {
    if pending.contains(id) {
        IndexStatus::Indexing
    } else if membership.contains(id) {
        IndexStatus::Indexed
    } else {
        IndexStatus::NotIndexed
    }
}

/// Decorate every listed resource with its reconciled status.
///
/// Order and length of `listing` are preserved.
pub fn reconcile(
    listing: &[Resource],
    membership: &[Resource],
    pending: &PendingMap,
) -> Vec<ResourceView> {
    let member_ids = membership_ids(membership);
    listing
        .iter()
        .map(|resource| ResourceView {
            status: status_of(&resource.resource_id, &member_ids, pending),
            resource: resource.clone(),
        })
        .collect()
}

/// Drop pending entries the membership snapshot confirms.
///
/// An `Index` entry is confirmed once the id appears in membership, a
/// `Deindex` entry once it no longer does. Returns the entries removed.
pub fn clear_confirmed(
    pending: &mut PendingMap,
    membership: &[Resource],
) -> Vec<(ResourceId, PendingOperation)> {
    let member_ids = membership_ids(membership);
    let mut cleared = Vec::new();
    pending.retain(|id, op| {
        let confirmed = match op {
            PendingOperation::Index => member_ids.contains(id),
            PendingOperation::Deindex => !member_ids.contains(id),
        };
        if confirmed {
            cleared.push((id.clone(), op));
        }
        !confirmed
    });
    if !cleared.is_empty() {
        tracing::debug!(
            cleared = cleared.len(),
            remaining = pending.len(),
            "Membership confirmed pending operations"
        );
    }
    cleared
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Vec<Resource> {
        vec![
            Resource::file("a", "a.txt"),
            Resource::file("b", "b.txt"),
            Resource::file("c", "c.txt"),
        ]
    }

    #[test]
    fn test_pending_wins_over_membership() {
        let membership = vec![Resource::file("a", "a.txt"), Resource::file("b", "b.txt")];
        let pending: PendingMap = [("a".into(), PendingOperation::Deindex)]
            .into_iter()
            .collect();

        let views = reconcile(&listing(), &membership, &pending);
        let statuses: Vec<IndexStatus> = views.iter().map(|v| v.status).collect();
        assert_eq!(
            statuses,
            vec![
                IndexStatus::Indexing,
                IndexStatus::Indexed,
                IndexStatus::NotIndexed
            ]
        );
    }

    #[test]
    fn test_reconcile_is_deterministic() {
        let membership = vec![Resource::file("b", "b.txt")];
        let pending: PendingMap = [("c".into(), PendingOperation::Index)].into_iter().collect();
        let first = reconcile(&listing(), &membership, &pending);
        let second = reconcile(&listing(), &membership, &pending);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].resource.resource_id.as_str(), "a");
    }

    #[test]
    fn test_empty_listing() {
        assert!(reconcile(&[], &listing(), &PendingMap::new()).is_empty());
    }

    #[test]
    fn test_clear_confirmed_index_and_deindex() {
        let membership = vec![Resource::file("a", "a.txt"), Resource::file("b", "b.txt")];
        let mut pending: PendingMap = [
            ("a".into(), PendingOperation::Index),   // confirmed
            ("b".into(), PendingOperation::Deindex), // still present
            ("c".into(), PendingOperation::Deindex), // confirmed
            ("d".into(), PendingOperation::Index),   // not yet visible
        ]
        .into_iter()
        .collect();

        let cleared = clear_confirmed(&mut pending, &membership);

        assert_eq!(cleared.len(), 2);
        assert!(!pending.contains(&"a".into()));
        assert!(!pending.contains(&"c".into()));
        assert_eq!(pending.get(&"b".into()), Some(PendingOperation::Deindex));
        assert_eq!(pending.get(&"d".into()), Some(PendingOperation::Index));
    }

    #[test]
    fn test_clear_confirmed_on_empty_pending_is_noop() {
        let mut pending = PendingMap::new();
        assert!(clear_confirmed(&mut pending, &listing()).is_empty());
    }
}
