//! # AccessGraph Graph Engine — Traversal & Deterministic Export
//!
//! The in-memory directed multigraph at the heart of AccessGraph:
//! - Node-by-id map with insertion-ordered adjacency indices
//! - Reachability primitives: BFS, unweighted shortest path, neighbors
//! - Attack-path search with sensitivity bias
//! - Deterministic exporters: Markdown report, SARIF v2.1.0, Neo4j Cypher
//!
//! A `Graph` value is safe for any number of concurrent readers; writers
//! need exclusive access (`&mut Graph`), which the borrow checker enforces.

pub mod attack_path;
pub mod export;
pub mod graph;

pub use attack_path::AttackPathResult;
pub use export::cypher::export_cypher;
pub use export::markdown::export_markdown_attack_path;
pub use export::sarif::export_sarif_attack_path;
pub use graph::Graph;
