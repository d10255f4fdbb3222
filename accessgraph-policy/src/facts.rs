//! Graph → fact-object projection.
//!
//! The fact object is the rule engine's entire view of the graph, so the
//! projection is intentionally compact: AWS roles with their trust posture,
//! policies with a single wildcard bit, and K8s bindings with a
//! cluster-admin bit. Maps are `BTreeMap` so the serialized object is
//! canonical for equal graphs.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use accessgraph_core::types::{EDGE_ALLOWS_ACTION, EDGE_BINDS_TO, EDGE_TRUSTS_CROSS_ACCOUNT};
use accessgraph_core::NodeKind;
use accessgraph_graph::Graph;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustFact {
    pub cross_account: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleFact {
    pub arn: String,
    pub name: String,
    pub trust: TrustFact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFact {
    pub id: String,
    pub name: String,
    pub action_matches_wildcard: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingFact {
    pub name: String,
    pub cluster_admin: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct K8sFacts {
    pub bindings: BTreeMap<String, BindingFact>,
}

/// The compact fact set handed to the rule evaluator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFacts {
    pub roles: BTreeMap<String, RoleFact>,
    pub policies: BTreeMap<String, PolicyFact>,
    pub k8s: K8sFacts,
}

/// Projects a loaded graph into policy facts.
pub fn build_facts(graph: &Graph) -> PolicyFacts {
    let nodes = graph.nodes();
    let edges = graph.edges();

    // One pass over the edge log builds every index the projection needs.
    let mut cross_account_sources: HashSet<&str> = HashSet::new();
    let mut allows: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut bind_edges: Vec<(&str, Option<&str>)> = Vec::new();
    for edge in &edges {
        match edge.kind.as_str() {
            EDGE_TRUSTS_CROSS_ACCOUNT => {
                cross_account_sources.insert(edge.src.as_str());
            }
            EDGE_ALLOWS_ACTION => {
                allows.entry(edge.src.as_str()).or_default().push(edge.dst.as_str());
            }
            EDGE_BINDS_TO => {
                bind_edges.push((edge.src.as_str(), edge.prop("binding")));
            }
            _ => {}
        }
    }

    let mut facts = PolicyFacts::default();

    for node in &nodes {
        match node.kind {
            NodeKind::Principal if node.labels.iter().any(|l| l == "aws-role") => {
                facts.roles.insert(
                    node.id.clone(),
                    RoleFact {
                        arn: node.id.clone(),
                        name: node.prop("name").unwrap_or_default().to_string(),
                        trust: TrustFact {
                            cross_account: cross_account_sources.contains(node.id.as_str()),
                        },
                    },
                );
            }
            NodeKind::Policy => {
                let wildcard = allows
                    .get(node.id.as_str())
                    .map(|permissions| {
                        permissions.iter().any(|perm_id| {
                            graph
                                .get_node(perm_id)
                                .filter(|n| n.kind == NodeKind::Permission)
                                .is_some_and(|n| {
                                    n.prop("wildcard") == Some("true")
                                        || n.prop("action").is_some_and(|a| a.contains('*'))
                                })
                        })
                    })
                    .unwrap_or(false);

                facts.policies.insert(
                    node.id.clone(),
                    PolicyFact {
                        id: node.id.clone(),
                        name: node.prop("name").unwrap_or_default().to_string(),
                        action_matches_wildcard: wildcard,
                    },
                );
            }
            _ => {}
        }
    }

    // Bindings: edge-log order, first occurrence of a binding name wins.
    for (role_id, binding_prop) in bind_edges {
        let role = match graph.get_node(role_id).filter(|n| n.kind == NodeKind::Role) {
            Some(role) => role,
            None => continue,
        };

        let binding_name = match binding_prop {
            Some(b) if !b.is_empty() => b.to_string(),
            _ => role.prop("name").unwrap_or_default().to_string(),
        };
        if facts.k8s.bindings.contains_key(&binding_name) {
            continue;
        }

        let cluster_admin =
            role.prop("cluster_admin") == Some("true") || role.prop("name") == Some("cluster-admin");
        facts.k8s.bindings.insert(
            binding_name.clone(),
            BindingFact {
                name: binding_name,
                cluster_admin,
            },
        );
    }

    facts
}

#[cfg(test)]
mod tests {
    use super::*;
    use accessgraph_core::{Edge, Node};

    #[test]
    fn test_cross_account_role_projection() {
        let mut g = Graph::new();
        g.add_node(
            Node::new("arn:aws:iam::111111111111:role/TestRole", NodeKind::Principal)
                .with_labels(["TestRole", "aws-role"])
                .with_prop("name", "TestRole"),
        );
        g.add_node(
            Node::new("arn:aws:iam::222222222222:root", NodeKind::Account)
                .with_labels(["222222222222", "aws-account"]),
        );
        g.add_edge(
            Edge::new(
                "arn:aws:iam::111111111111:role/TestRole",
                "arn:aws:iam::222222222222:root",
                EDGE_TRUSTS_CROSS_ACCOUNT,
            )
            .with_prop("principal", "arn:aws:iam::222222222222:role/ExtRole"),
        )
        .unwrap();

        let facts = build_facts(&g);
        let role = &facts.roles["arn:aws:iam::111111111111:role/TestRole"];
        assert_eq!(role.name, "TestRole");
        assert!(role.trust.cross_account);
    }

    #[test]
    fn test_role_without_trust_edges_is_not_cross_account() {
        let mut g = Graph::new();
        g.add_node(
            Node::new("arn:aws:iam::111111111111:role/Plain", NodeKind::Principal)
                .with_labels(["Plain", "aws-role"]),
        );
        let facts = build_facts(&g);
        assert!(!facts.roles["arn:aws:iam::111111111111:role/Plain"].trust.cross_account);
    }

    #[test]
    fn test_non_aws_principals_are_excluded_from_roles() {
        let mut g = Graph::new();
        g.add_node(
            Node::new("k8s:sa:default:test-sa", NodeKind::Principal)
                .with_labels(["test-sa", "k8s-serviceaccount"]),
        );
        let facts = build_facts(&g);
        assert!(facts.roles.is_empty());
    }

    #[test]
    fn test_wildcard_policy_projection() {
        let policy_id = "arn:aws:iam::111111111111:policy/TestPolicy";
        let perm_id = format!("{policy_id}#stmt0#s3:*");

        let mut g = Graph::new();
        g.add_node(Node::new(policy_id, NodeKind::Policy).with_prop("name", "TestPolicy"));
        g.add_node(
            Node::new(&perm_id, NodeKind::Permission)
                .with_prop("action", "s3:*")
                .with_prop("wildcard", "true"),
        );
        g.add_edge(
            Edge::new(policy_id, &perm_id, EDGE_ALLOWS_ACTION).with_prop("statement_index", "0"),
        )
        .unwrap();

        let facts = build_facts(&g);
        assert!(facts.policies[policy_id].action_matches_wildcard);
    }

    #[test]
    fn test_narrow_policy_is_not_wildcard() {
        let policy_id = "arn:aws:iam::111111111111:policy/Narrow";
        let perm_id = format!("{policy_id}#stmt0#s3:GetObject");

        let mut g = Graph::new();
        g.add_node(Node::new(policy_id, NodeKind::Policy));
        g.add_node(
            Node::new(&perm_id, NodeKind::Permission)
                .with_prop("action", "s3:GetObject")
                .with_prop("wildcard", "false"),
        );
        g.add_edge(Edge::new(policy_id, &perm_id, EDGE_ALLOWS_ACTION)).unwrap();

        let facts = build_facts(&g);
        assert!(!facts.policies[policy_id].action_matches_wildcard);

        // A policy with no permissions at all is also not wildcard.
        let mut g = Graph::new();
        g.add_node(Node::new("arn:aws:iam::1:policy/Empty", NodeKind::Policy));
        let facts = build_facts(&g);
        assert!(!facts.policies["arn:aws:iam::1:policy/Empty"].action_matches_wildcard);
    }

    #[test]
    fn test_wildcard_detected_from_action_prop_alone() {
        // Permission carries a *-containing action but no wildcard prop.
        let mut g = Graph::new();
        g.add_node(Node::new("p", NodeKind::Policy));
        g.add_node(Node::new("p#stmt0#iam:Pass*", NodeKind::Permission).with_prop("action", "iam:Pass*"));
        g.add_edge(Edge::new("p", "p#stmt0#iam:Pass*", EDGE_ALLOWS_ACTION)).unwrap();

        let facts = build_facts(&g);
        assert!(facts.policies["p"].action_matches_wildcard);
    }

    #[test]
    fn test_cluster_admin_binding_projection() {
        let mut g = Graph::new();
        g.add_node(
            Node::new("k8s:role:cluster-admin", NodeKind::Role)
                .with_prop("name", "cluster-admin")
                .with_prop("cluster_admin", "true"),
        );
        g.add_node(Node::new("k8s:sa:default:test-sa", NodeKind::Principal));
        g.add_edge(
            Edge::new("k8s:role:cluster-admin", "k8s:sa:default:test-sa", EDGE_BINDS_TO)
                .with_prop("binding", "test-binding"),
        )
        .unwrap();

        let facts = build_facts(&g);
        let binding = &facts.k8s.bindings["test-binding"];
        assert_eq!(binding.name, "test-binding");
        assert!(binding.cluster_admin);
    }

    #[test]
    fn test_binding_emitted_at_most_once() {
        let mut g = Graph::new();
        g.add_node(Node::new("k8s:role:reader", NodeKind::Role).with_prop("name", "reader"));
        g.add_node(Node::new("k8s:sa:default:a", NodeKind::Principal));
        g.add_node(Node::new("k8s:sa:default:b", NodeKind::Principal));
        for subject in ["k8s:sa:default:a", "k8s:sa:default:b"] {
            g.add_edge(
                Edge::new("k8s:role:reader", subject, EDGE_BINDS_TO)
                    .with_prop("binding", "shared-binding"),
            )
            .unwrap();
        }

        let facts = build_facts(&g);
        assert_eq!(facts.k8s.bindings.len(), 1);
        assert!(!facts.k8s.bindings["shared-binding"].cluster_admin);
    }

    #[test]
    fn test_binding_name_falls_back_to_role_name() {
        let mut g = Graph::new();
        g.add_node(Node::new("k8s:role:viewer", NodeKind::Role).with_prop("name", "viewer"));
        g.add_node(Node::new("k8s:sa:default:sa", NodeKind::Principal));
        g.add_edge(Edge::new("k8s:role:viewer", "k8s:sa:default:sa", EDGE_BINDS_TO)).unwrap();

        let facts = build_facts(&g);
        assert!(facts.k8s.bindings.contains_key("viewer"));
    }

    #[test]
    fn test_empty_graph_projects_empty_maps() {
        let facts = build_facts(&Graph::new());
        assert!(facts.roles.is_empty());
        assert!(facts.policies.is_empty());
        assert!(facts.k8s.bindings.is_empty());

        let json = serde_json::to_value(&facts).unwrap();
        assert_eq!(json["roles"], serde_json::json!({}));
        assert_eq!(json["k8s"]["bindings"], serde_json::json!({}));
    }

    #[test]
    fn test_projection_serialization_is_canonical() {
        let mut g = Graph::new();
        g.add_node(Node::new("b-policy", NodeKind::Policy));
        g.add_node(Node::new("a-policy", NodeKind::Policy));
        let a = serde_json::to_string(&build_facts(&g)).unwrap();

        let mut g = Graph::new();
        g.add_node(Node::new("a-policy", NodeKind::Policy));
        g.add_node(Node::new("b-policy", NodeKind::Policy));
        let b = serde_json::to_string(&build_facts(&g)).unwrap();

        assert_eq!(a, b);
    }
}
