//! Neo4j Cypher export.
//!
//! Emits an idempotent (MERGE-based) script: schema header, then all nodes
//! sorted by id, then all edges sorted by `(src, dst, kind)`. Kind segments
//! are sanitized into Cypher-safe label/relationship names; string literals
//! escape backslashes and double quotes.

use std::fmt::Write;

use accessgraph_core::{Edge, Node};

use crate::graph::Graph;

const HEADER: &str = "\
// AccessGraph Neo4j Export
// Deterministic output: nodes sorted by id, edges by (src, dst, kind).

CREATE CONSTRAINT node_id IF NOT EXISTS FOR (n:Node) REQUIRE n.id IS UNIQUE;
CREATE INDEX node_kind_idx IF NOT EXISTS FOR (n:Node) ON (n.kind);
";

/// Renders the whole graph as a Cypher script. Empty graphs produce the
/// header and section markers with zero statements.
pub fn export_cypher(graph: &Graph) -> String {
    let mut out = String::from(HEADER);

    let mut nodes: Vec<Node> = graph.nodes();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    out.push_str("\n// ========== NODES ==========\n");
    for node in &nodes {
        let labels = node
            .labels
            .iter()
            .map(|l| quote_string(l))
            .collect::<Vec<_>>()
            .join(", ");
        // props are a BTreeMap, so the embedded JSON payload is canonical.
        let props_json = serde_json::to_string(&node.props).unwrap_or_else(|_| "{}".into());
        let _ = writeln!(
            out,
            "MERGE (n:Node:K_{kind} {{id: {id}}}) SET n.kind = {kind_str}, n.labels = [{labels}], n.props = {props};",
            kind = sanitize_label(node.kind.as_str()),
            id = quote_string(&node.id),
            kind_str = quote_string(node.kind.as_str()),
            labels = labels,
            props = quote_string(&props_json),
        );
    }

    let mut edges: Vec<Edge> = graph.edges();
    edges.sort_by(|a, b| {
        (a.src.as_str(), a.dst.as_str(), a.kind.as_str())
            .cmp(&(b.src.as_str(), b.dst.as_str(), b.kind.as_str()))
    });

    out.push_str("\n// ========== EDGES ==========\n");
    for edge in &edges {
        let props_json = serde_json::to_string(&edge.props).unwrap_or_else(|_| "{}".into());
        let _ = writeln!(
            out,
            "MATCH (a:Node {{id: {src}}}) MATCH (b:Node {{id: {dst}}}) MERGE (a)-[r:K_{kind}]->(b) SET r.props = {props};",
            src = quote_string(&edge.src),
            dst = quote_string(&edge.dst),
            kind = sanitize_label(&edge.kind),
            props = quote_string(&props_json),
        );
    }

    out
}

/// Keeps `[A-Za-z0-9_]`, mapping every other character to `_`, so kinds are
/// always legal Cypher label / relationship-type segments.
fn sanitize_label(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Double-quoted Cypher string literal with `\` and `"` escaped.
fn quote_string(raw: &str) -> String {
    let escaped = raw.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
