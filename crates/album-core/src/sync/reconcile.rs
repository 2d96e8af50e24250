//! Membership reconciliation: desired state versus persisted state.
//!
//! Pure set arithmetic; the engine applies the resulting plan against the
//! catalog and then persists the new snapshot. Designed to be idempotent:
//! re-running with an unchanged desired set against the post-apply snapshot
//! yields an empty plan.

use std::collections::{BTreeMap, BTreeSet};

use album_config::SyncMode;
use album_store::{MatchKind, MatchRecord};

/// What one rule's reconciliation decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Assets to add to the album, each tagged with how it matched.
    pub to_add: Vec<(String, MatchKind)>,
    /// Assets to remove from the album; always empty in add-only mode.
    pub to_remove: Vec<String>,
    /// The snapshot to persist after the catalog mutations succeed.
    pub membership: Vec<(String, MatchKind)>,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Compute the operation plan for one rule.
///
/// An asset in both desired sets counts as exact. Persisted records keep
/// their stored kind in the new snapshot; a match kind is written once and
/// never rewritten by later cycles.
pub fn reconcile(
    exact: &BTreeSet<String>,
    fuzzy: &BTreeSet<String>,
    persisted: &[MatchRecord],
    mode: SyncMode,
) -> ReconcilePlan {
    let mut desired: BTreeMap<&str, MatchKind> = BTreeMap::new();
    for id in fuzzy {
        desired.insert(id, MatchKind::Fuzzy);
    }
    for id in exact {
        desired.insert(id, MatchKind::Exact);
    }

    let persisted_kinds: BTreeMap<&str, MatchKind> = persisted
        .iter()
        .map(|record| (record.asset_id.as_str(), record.kind))
        .collect();

    let to_add: Vec<(String, MatchKind)> = desired
        .iter()
        .filter(|(id, _)| !persisted_kinds.contains_key(*id))
        .map(|(id, kind)| ((*id).to_string(), *kind))
        .collect();

    let to_remove: Vec<String> = match mode {
        SyncMode::Sync => persisted_kinds
            .keys()
            .filter(|id| !desired.contains_key(*id))
            .map(|id| (*id).to_string())
            .collect(),
        SyncMode::AddOnly => Vec::new(),
    };

    let removed: BTreeSet<&str> = to_remove.iter().map(String::as_str).collect();
    let mut membership: BTreeMap<&str, MatchKind> = BTreeMap::new();
    for (id, kind) in &persisted_kinds {
        if !removed.contains(id) {
            membership.insert(id, *kind);
        }
    }
    for (id, kind) in &to_add {
        membership.insert(id, *kind);
    }

    let membership: Vec<(String, MatchKind)> = membership
        .into_iter()
        .map(|(id, kind)| (id.to_string(), kind))
        .collect();

    ReconcilePlan {
        to_add,
        to_remove,
        membership,
    }
}
