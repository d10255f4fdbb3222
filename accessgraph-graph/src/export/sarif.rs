//! SARIF v2.1.0 export for attack paths.
//!
//! One rule per distinct edge kind on the path, one result per hop. Results
//! carry a deterministic `accessgraph://path/<digest>` location so CI systems
//! can fingerprint a hop across runs without leaking full node ids into URIs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use accessgraph_core::{AccessGraphError, AgResult, Edge, Node};

use super::{is_critical_edge, truncate_id};

const SARIF_VERSION: &str = "2.1.0";
const SARIF_SCHEMA: &str = "https://json.schemastore.org/sarif-2.1.0.json";
const DRIVER_NAME: &str = "AccessGraph";
const DRIVER_INFO_URI: &str = "https://github.com/accessgraph/accessgraph";

#[derive(Debug, Serialize, Deserialize)]
pub struct Sarif {
    pub version: String,
    #[serde(rename = "$schema")]
    pub schema: String,
    pub runs: Vec<SarifRun>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifRun {
    pub tool: SarifTool,
    pub results: Vec<SarifResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifTool {
    pub driver: SarifDriver,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifDriver {
    pub name: String,
    pub version: String,
    #[serde(rename = "informationUri")]
    pub information_uri: String,
    pub rules: Vec<SarifRule>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifRule {
    pub id: String,
    #[serde(rename = "shortDescription")]
    pub short_description: SarifText,
    #[serde(rename = "fullDescription")]
    pub full_description: SarifText,
    pub help: SarifText,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifText {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifResult {
    #[serde(rename = "ruleId")]
    pub rule_id: String,
    #[serde(rename = "ruleIndex")]
    pub rule_index: usize,
    pub level: String,
    pub message: SarifText,
    pub locations: Vec<SarifLocation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    pub physical_location: SarifPhysicalLocation,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    pub artifact_location: SarifArtifactLocation,
    pub region: SarifRegion,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifArtifactLocation {
    pub uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SarifRegion {
    #[serde(rename = "startLine")]
    pub start_line: usize,
}

/// Exports an attack path as a SARIF v2.1.0 document. A path with no nodes
/// is rejected: there is nothing to anchor rules or results to.
pub fn export_sarif_attack_path(
    _from: &str,
    _to: &str,
    nodes: &[Node],
    edges: &[Edge],
) -> AgResult<String> {
    if nodes.is_empty() {
        return Err(AccessGraphError::NotFound("no nodes in path".into()));
    }

    // Rules: one per distinct edge kind, in first-seen path order.
    let mut rule_index: HashMap<&str, usize> = HashMap::new();
    let mut rules = Vec::new();
    for edge in edges {
        if rule_index.contains_key(edge.kind.as_str()) {
            continue;
        }
        rule_index.insert(edge.kind.as_str(), rules.len());
        rules.push(SarifRule {
            id: format!("attack-path/{}", edge.kind),
            short_description: SarifText {
                text: format!("Attack path edge: {}", edge.kind),
            },
            full_description: SarifText {
                text: format!(
                    "This edge represents a {} relationship in the access graph \
                     that can be exploited in an attack path",
                    edge.kind
                ),
            },
            help: SarifText {
                text: "Review and restrict permissions to prevent unauthorized access \
                       along this path"
                    .into(),
            },
        });
    }

    // Results: one per hop.
    let mut results = Vec::new();
    for (i, edge) in edges.iter().enumerate() {
        let (from_node, to_node) = match (nodes.get(i), nodes.get(i + 1)) {
            (Some(a), Some(b)) => (a, b),
            _ => break,
        };

        let level = if is_critical_edge(edge) { "error" } else { "warning" };

        let mut message = format!(
            "Step {}: {} ({}) -> {} ({}) via {}",
            i + 1,
            truncate_id(&from_node.id),
            from_node.kind,
            truncate_id(&to_node.id),
            to_node.kind,
            edge.kind,
        );
        if let Some(action) = edge.prop("action") {
            message.push_str(&format!(" [Action: {action}]"));
        }

        results.push(SarifResult {
            rule_id: format!("attack-path/{}", edge.kind),
            rule_index: rule_index[edge.kind.as_str()],
            level: level.into(),
            message: SarifText { text: message },
            locations: vec![SarifLocation {
                physical_location: SarifPhysicalLocation {
                    artifact_location: SarifArtifactLocation {
                        uri: stable_uri(&from_node.id, &to_node.id),
                    },
                    region: SarifRegion { start_line: i + 1 },
                },
            }],
        });
    }

    let sarif = Sarif {
        version: SARIF_VERSION.into(),
        schema: SARIF_SCHEMA.into(),
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: DRIVER_NAME.into(),
                    version: env!("CARGO_PKG_VERSION").into(),
                    information_uri: DRIVER_INFO_URI.into(),
                    rules,
                },
            },
            results,
        }],
    };

    Ok(serde_json::to_string_pretty(&sarif)?)
}

/// Deterministic per-hop URI: `accessgraph://path/<16 hex of sha256(src->dst)>`.
fn stable_uri(from_id: &str, to_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(from_id.as_bytes());
    hasher.update(b"->");
    hasher.update(to_id.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("accessgraph://path/{}", &hex[..16])
}
