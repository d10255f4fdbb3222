//! # AccessGraph Core — Shared Vocabulary & Runtime Plumbing
//!
//! The foundation every other AccessGraph crate links against:
//! - Closed node-kind enumeration, node/edge records, canonical identifiers
//! - The error taxonomy (`AccessGraphError` / `AgResult`)
//! - Cancellation/deadline tokens for blocking operations
//! - Environment-driven configuration
//! - Log redaction (account IDs, ARNs, secrets) and the tracing bootstrap
//! - The bounded loaded-graph LRU cache with single-flight loading

pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod ids;
pub mod redact;
pub mod types;

pub use cache::SnapshotCache;
pub use cancel::CancelToken;
pub use config::Config;
pub use error::{AccessGraphError, AgResult};
pub use redact::{redact, RedactWriter, Redactor};
pub use types::{Edge, Node, NodeKind, ParseBatch};

/// Default hop bound for path queries when the caller passes zero.
pub const DEFAULT_MAX_HOPS: usize = 8;
/// Default depth bound for breadth-first exploration when the caller passes zero.
pub const DEFAULT_BFS_DEPTH: usize = 3;
/// Default capacity of the loaded-graph cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 16;
