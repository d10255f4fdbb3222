//! Snapshot diffing over persisted edge sets.
//!
//! Two snapshots are compared by their edge keys (`src|dst|kind`); props do
//! not participate, so a prop-only change reads as neither added nor removed.

use std::collections::HashMap;

use accessgraph_core::{AgResult, CancelToken, Edge};

use crate::sqlite::SnapshotStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
}

/// Edge-level difference from snapshot `a` to snapshot `b`.
#[derive(Debug, Clone, Default)]
pub struct SnapshotDiff {
    /// Edges present in `b` but not `a`, sorted by key.
    pub added: Vec<Edge>,
    /// Edges present in `a` but not `b`, sorted by key.
    pub removed: Vec<Edge>,
    pub summary: DiffSummary,
}

/// Computes the edge diff between two stored snapshots.
pub fn diff_snapshots(
    store: &SnapshotStore,
    token: &CancelToken,
    a: &str,
    b: &str,
) -> AgResult<SnapshotDiff> {
    let edges_a = store.get_edges(token, a)?;
    let edges_b = store.get_edges(token, b)?;

    let map_a: HashMap<String, &Edge> = edges_a.iter().map(|e| (e.key(), e)).collect();
    let map_b: HashMap<String, &Edge> = edges_b.iter().map(|e| (e.key(), e)).collect();

    let mut added: Vec<Edge> = map_b
        .iter()
        .filter(|(key, _)| !map_a.contains_key(*key))
        .map(|(_, e)| (*e).clone())
        .collect();
    let mut removed: Vec<Edge> = map_a
        .iter()
        .filter(|(key, _)| !map_b.contains_key(*key))
        .map(|(_, e)| (*e).clone())
        .collect();

    added.sort_by_key(|e| e.key());
    removed.sort_by_key(|e| e.key());

    let summary = DiffSummary {
        added: added.len(),
        removed: removed.len(),
        changed: 0,
    };

    Ok(SnapshotDiff {
        added,
        removed,
        summary,
    })
}
