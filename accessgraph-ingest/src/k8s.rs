//! Kubernetes RBAC parser: multi-document YAML manifests.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use accessgraph_core::ids;
use accessgraph_core::types::{EDGE_ALLOWS_ACTION, EDGE_BINDS_TO, EDGE_IN_NAMESPACE};
use accessgraph_core::{AccessGraphError, AgResult, Edge, Node, NodeKind, ParseBatch};

const MANIFEST_FILES: &[&str] = &[
    "serviceaccounts.yaml",
    "clusterroles.yaml",
    "rolebindings.yaml",
    "networkpolicies.yaml",
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct K8sResource {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    subjects: Vec<Subject>,
    #[serde(default)]
    role_ref: RoleRef,
    #[serde(default)]
    rules: Vec<Rule>,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
    /// BTreeMap keeps emitted label order deterministic.
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct Subject {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
}

#[derive(Debug, Default, Deserialize)]
struct RoleRef {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Rule {
    #[serde(default)]
    resources: Vec<String>,
    #[serde(default)]
    verbs: Vec<String>,
}

/// Parses Kubernetes RBAC manifests from a directory. Each file may hold
/// multiple YAML documents; missing files are skipped silently. An
/// undecodable document stops that file's stream with a diagnostic but does
/// not fail the parse.
pub fn parse_k8s(dir: impl AsRef<Path>) -> AgResult<ParseBatch> {
    let dir = dir.as_ref();
    let mut result = ParseBatch::new();

    for file in MANIFEST_FILES {
        let path = dir.join(file);
        if !path.exists() {
            continue;
        }
        let data = std::fs::read_to_string(&path)
            .map_err(|e| AccessGraphError::parse(*file, e))?;

        for document in serde_yaml::Deserializer::from_str(&data) {
            let value = match serde_yaml::Value::deserialize(document) {
                Ok(value) => value,
                Err(e) => {
                    let diag = format!("{file}: undecodable document: {e}");
                    warn!("{diag}");
                    result.diagnostics.push(diag);
                    break;
                }
            };
            if value.is_null() {
                continue;
            }
            let resource: K8sResource = match serde_yaml::from_value(value) {
                Ok(resource) => resource,
                Err(e) => {
                    // A wrong-shaped document ends this file's stream, the
                    // same as a syntax error.
                    let diag = format!("{file}: unexpected document shape: {e}");
                    warn!("{diag}");
                    result.diagnostics.push(diag);
                    break;
                }
            };
            parse_resource(&resource, &mut result);
        }
    }

    Ok(result)
}

fn parse_resource(resource: &K8sResource, result: &mut ParseBatch) {
    let meta = &resource.metadata;
    match resource.kind.as_str() {
        "ServiceAccount" => {
            let sa_id = ids::k8s_service_account(&meta.namespace, &meta.name);
            result.nodes.push(
                Node::new(&sa_id, NodeKind::Principal)
                    .with_labels([meta.name.as_str(), "k8s-serviceaccount"])
                    .with_prop("name", &meta.name)
                    .with_prop("namespace", &meta.namespace),
            );

            if !meta.namespace.is_empty() {
                let ns_id = ids::k8s_namespace(&meta.namespace);
                result.nodes.push(
                    Node::new(&ns_id, NodeKind::Namespace)
                        .with_labels([meta.namespace.as_str()])
                        .with_prop("name", &meta.namespace),
                );
                result.edges.push(Edge::new(&sa_id, &ns_id, EDGE_IN_NAMESPACE));
            }
        }

        kind @ ("ClusterRole" | "Role") => {
            let namespace = (kind == "Role").then_some(meta.namespace.as_str());
            let role_id = ids::k8s_role(namespace, &meta.name);
            let cluster_admin = meta.name == "cluster-admin";
            let kind_label = format!("k8s-{}", kind.to_lowercase());

            result.nodes.push(
                Node::new(&role_id, NodeKind::Role)
                    .with_labels([meta.name.as_str(), kind_label.as_str()])
                    .with_prop("name", &meta.name)
                    .with_prop("cluster_admin", if cluster_admin { "true" } else { "false" }),
            );

            for (i, rule) in resource.rules.iter().enumerate() {
                for verb in &rule.verbs {
                    for res in &rule.resources {
                        let perm_id = ids::rule_permission(&role_id, i, verb, res);
                        let wildcard = verb == "*" || res == "*";
                        result.nodes.push(
                            Node::new(&perm_id, NodeKind::Permission)
                                .with_labels([format!("{verb}:{res}")])
                                .with_prop("verb", verb)
                                .with_prop("resource", res)
                                .with_prop("wildcard", if wildcard { "true" } else { "false" }),
                        );
                        result.edges.push(
                            Edge::new(&role_id, &perm_id, EDGE_ALLOWS_ACTION)
                                .with_prop("rule_index", i.to_string()),
                        );
                    }
                }
            }
        }

        "ClusterRoleBinding" | "RoleBinding" => {
            let binding_id = ids::k8s_binding(&meta.name);
            let role_id = ids::k8s_role(None, &resource.role_ref.name);

            for subject in &resource.subjects {
                let subject_id = if subject.kind == "ServiceAccount" {
                    let ns = if subject.namespace.is_empty() {
                        &meta.namespace
                    } else {
                        &subject.namespace
                    };
                    ids::k8s_service_account(ns, &subject.name)
                } else {
                    ids::k8s_subject(&subject.kind, &subject.name)
                };

                result.edges.push(
                    Edge::new(&role_id, &subject_id, EDGE_BINDS_TO)
                        .with_prop("binding", &binding_id),
                );
            }
        }

        "NetworkPolicy" => {
            // Metadata only; no traversal semantics.
            let np_id = ids::k8s_network_policy(&meta.namespace, &meta.name);
            let mut labels = vec![meta.name.clone()];
            labels.extend(meta.labels.iter().map(|(k, v)| format!("{k}={v}")));
            result.nodes.push(
                Node::new(&np_id, NodeKind::Resource)
                    .with_labels(labels)
                    .with_prop("name", &meta.name)
                    .with_prop("namespace", &meta.namespace)
                    .with_prop("type", "NetworkPolicy"),
            );
        }

        _ => {}
    }
}
