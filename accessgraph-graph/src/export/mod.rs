//! Deterministic exporters.
//!
//! Every exporter is a pure function of its inputs: inputs are sorted before
//! rendering and no wall-clock, environment, or hash-map iteration order ever
//! reaches the output, so equal graphs produce byte-identical bytes.

pub mod cypher;
pub mod markdown;
pub mod sarif;

use accessgraph_core::Edge;

/// An edge is critical when it crosses an account boundary or grants a
/// service-level wildcard (`*` or `<svc>:*`).
pub(crate) fn is_critical_edge(edge: &Edge) -> bool {
    if edge.prop("cross_account") == Some("true") {
        return true;
    }
    match edge.prop("action") {
        Some(action) => action == "*" || action.ends_with(":*"),
        None => false,
    }
}

/// Shortens long node ids for display.
pub(crate) fn truncate_id(id: &str) -> String {
    if id.len() <= 60 {
        id.to_string()
    } else {
        format!("{}...", &id[..57])
    }
}
