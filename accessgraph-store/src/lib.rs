//! # AccessGraph Snapshot Store — Durable Multi-Snapshot Repository
//!
//! SQLite-backed persistence for graph snapshots:
//! - Three tables (snapshots, nodes, edges) with JSON label/prop payloads,
//!   so new props never require a schema migration
//! - Transactional writes: a snapshot is never partially observable
//! - Deterministic reads: nodes by id, edges by (src, dst, kind)
//! - Search, counts, and edge enumeration for snapshot diffs
//!
//! The store assumes at most one writer process at a time; in-process readers
//! and writers coordinate through the loaded-graph cache.

pub mod diff;
pub mod sqlite;

pub use diff::{diff_snapshots, DiffSummary, SnapshotDiff};
pub use sqlite::{SnapshotMeta, SnapshotStore};
