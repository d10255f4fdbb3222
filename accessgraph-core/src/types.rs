//! Shared graph vocabulary: node kinds, node/edge records, parser batches.
//!
//! Nodes carry a closed `kind` discriminator plus an open string→string
//! property bag; properties use `BTreeMap` so every serialization of the same
//! node is byte-identical regardless of insertion order.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "PRINCIPAL")]
    Principal,
    #[serde(rename = "ROLE")]
    Role,
    #[serde(rename = "POLICY")]
    Policy,
    #[serde(rename = "PERMISSION")]
    Permission,
    #[serde(rename = "RESOURCE")]
    Resource,
    #[serde(rename = "NAMESPACE")]
    Namespace,
    #[serde(rename = "ACCOUNT")]
    Account,
}

impl NodeKind {
    /// The wire name used in storage rows and exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Principal => "PRINCIPAL",
            NodeKind::Role => "ROLE",
            NodeKind::Policy => "POLICY",
            NodeKind::Permission => "PERMISSION",
            NodeKind::Resource => "RESOURCE",
            NodeKind::Namespace => "NAMESPACE",
            NodeKind::Account => "ACCOUNT",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = crate::error::AccessGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRINCIPAL" => Ok(NodeKind::Principal),
            "ROLE" => Ok(NodeKind::Role),
            "POLICY" => Ok(NodeKind::Policy),
            "PERMISSION" => Ok(NodeKind::Permission),
            "RESOURCE" => Ok(NodeKind::Resource),
            "NAMESPACE" => Ok(NodeKind::Namespace),
            "ACCOUNT" => Ok(NodeKind::Account),
            other => Err(crate::error::AccessGraphError::NotFound(format!(
                "unknown node kind: {other}"
            ))),
        }
    }
}

// ── Edge kinds ───────────────────────────────────────────────────────────────
//
// Edge kinds are opaque strings to the traversal layer; these constants cover
// the kinds the built-in parsers emit. Parser-introduced kinds (HAS_POLICY,
// HAS_ACCESS, ...) pass through untouched.

pub const EDGE_ASSUMES_ROLE: &str = "ASSUMES_ROLE";
pub const EDGE_TRUSTS_CROSS_ACCOUNT: &str = "TRUSTS_CROSS_ACCOUNT";
pub const EDGE_ATTACHED_POLICY: &str = "ATTACHED_POLICY";
pub const EDGE_ALLOWS_ACTION: &str = "ALLOWS_ACTION";
pub const EDGE_APPLIES_TO: &str = "APPLIES_TO";
pub const EDGE_BINDS_TO: &str = "BINDS_TO";
pub const EDGE_IN_NAMESPACE: &str = "IN_NAMESPACE";

/// A graph node. Identity is the opaque `id`, globally unique across kinds
/// within one snapshot. Label order carries no semantic meaning but must
/// round-trip through storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub labels: Vec<String>,
    pub props: BTreeMap<String, String>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            labels: Vec::new(),
            props: BTreeMap::new(),
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Convenience accessor for a property value.
    pub fn prop(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    /// Whether this node is marked sensitive (`props["sensitive"] == "true"`).
    pub fn is_sensitive(&self) -> bool {
        self.prop("sensitive") == Some("true")
    }
}

/// A directed edge. Both endpoints must resolve within the same graph at
/// insertion time; multiple edges may connect the same ordered pair when
/// their kinds differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub src: String,
    pub dst: String,
    pub kind: String,
    pub props: BTreeMap<String, String>,
}

impl Edge {
    pub fn new(
        src: impl Into<String>,
        dst: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            kind: kind.into(),
            props: BTreeMap::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn prop(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    /// Stable comparison key used for snapshot diffs: `"src|dst|kind"`.
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.src, self.dst, self.kind)
    }
}

/// The shared output shape of every parser: a node/edge batch plus the
/// diagnostics recorded for skipped malformed records.
#[derive(Debug, Clone, Default)]
pub struct ParseBatch {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub diagnostics: Vec<String>,
}

impl ParseBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenates another batch onto this one. Deduplication is the graph's
    /// responsibility, not the parsers'.
    pub fn merge(&mut self, other: ParseBatch) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_round_trip() {
        for kind in [
            NodeKind::Principal,
            NodeKind::Role,
            NodeKind::Policy,
            NodeKind::Permission,
            NodeKind::Resource,
            NodeKind::Namespace,
            NodeKind::Account,
        ] {
            let parsed: NodeKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("WIDGET".parse::<NodeKind>().is_err());
    }

    #[test]
    fn test_node_serialization_is_canonical() {
        let a = Node::new("n1", NodeKind::Principal)
            .with_prop("zeta", "1")
            .with_prop("alpha", "2");
        let b = Node::new("n1", NodeKind::Principal)
            .with_prop("alpha", "2")
            .with_prop("zeta", "1");
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_edge_key() {
        let e = Edge::new("a", "b", "HAS_ACCESS");
        assert_eq!(e.key(), "a|b|HAS_ACCESS");
    }

    #[test]
    fn test_batch_merge_concatenates() {
        let mut a = ParseBatch::new();
        a.nodes.push(Node::new("n1", NodeKind::Policy));
        let mut b = ParseBatch::new();
        b.nodes.push(Node::new("n1", NodeKind::Policy));
        b.edges.push(Edge::new("n1", "n1", "SELF"));
        b.diagnostics.push("skipped record 3".into());

        a.merge(b);
        assert_eq!(a.nodes.len(), 2);
        assert_eq!(a.edges.len(), 1);
        assert_eq!(a.diagnostics.len(), 1);
    }
}
