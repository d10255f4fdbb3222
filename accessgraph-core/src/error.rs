use thiserror::Error;

pub type AgResult<T> = Result<T, AccessGraphError>;

/// The error taxonomy shared by every AccessGraph crate.
///
/// Parsers accumulate per-record problems as diagnostics and surface only
/// document-level failures; graph and store operations report precise, named
/// errors so callers can distinguish "no path" from "unknown node" without
/// string matching.
#[derive(Error, Debug)]
pub enum AccessGraphError {
    #[error("parsing {source_id}: {detail}")]
    ParseMalformed { source_id: String, detail: String },

    #[error("edge endpoint not found: {src} -> {dst}")]
    MissingEndpoint { src: String, dst: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no path found")]
    NoPath,

    #[error("path exceeds max hops: {hops} > {max_hops}")]
    ExceedsMaxHops { hops: usize, max_hops: usize },

    #[error("target ID or 'sensitive' tag required")]
    MissingTarget,

    #[error("no principals found with policy {0}")]
    NoPrincipals(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("evaluator error: {0}")]
    Evaluator(String),

    #[error("operation canceled")]
    Canceled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AccessGraphError {
    /// Wraps an underlying storage failure, preserving its rendered cause.
    pub fn storage(cause: impl std::fmt::Display) -> Self {
        AccessGraphError::Storage(cause.to_string())
    }

    /// Wraps a document-level parse failure with its source identifier.
    pub fn parse(source_id: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        AccessGraphError::ParseMalformed {
            source_id: source_id.into(),
            detail: detail.to_string(),
        }
    }
}
