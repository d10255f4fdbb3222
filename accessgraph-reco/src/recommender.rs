//! Wildcard-policy narrowing.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::json;

use accessgraph_core::types::EDGE_ATTACHED_POLICY;
use accessgraph_core::{AccessGraphError, AgResult, Node, NodeKind, DEFAULT_MAX_HOPS};
use accessgraph_graph::Graph;

const DEFAULT_CAP: usize = 20;
const NO_WILDCARD_RATIONALE: &str = "Policy does not contain wildcard permissions";

/// Edge kinds that attach a principal to a policy.
const ATTACHMENT_KINDS: &[&str] = &[EDGE_ATTACHED_POLICY, "HAS_POLICY", "HAS_ROLE"];

/// A least-privilege recommendation for one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "policyId")]
    pub policy_id: String,
    #[serde(rename = "suggestedActions")]
    pub suggested_actions: Vec<String>,
    #[serde(rename = "suggestedResources")]
    pub suggested_resources: Vec<String>,
    #[serde(rename = "patchJson")]
    pub patch_json: String,
    pub rationale: String,
}

/// Generates least-privilege recommendations over a loaded graph.
pub struct Recommender<'g> {
    graph: &'g Graph,
}

impl<'g> Recommender<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self { graph }
    }

    /// Narrows a wildcard policy to the actions and resources observed on
    /// paths from its attached principals to the target set.
    ///
    /// Targets: an explicit `target_id`, else all sensitive resources when
    /// `tags` contains `"sensitive"`, else every resource node. `cap == 0`
    /// means the default of 20 suggestions per dimension.
    pub fn recommend(
        &self,
        policy_id: &str,
        target_id: &str,
        tags: &[String],
        cap: usize,
    ) -> AgResult<Recommendation> {
        let cap = if cap == 0 { DEFAULT_CAP } else { cap };

        let policy = self
            .graph
            .get_node(policy_id)
            .ok_or_else(|| AccessGraphError::NotFound(format!("policy not found: {policy_id}")))?;

        if !has_wildcard(policy) {
            return Ok(Recommendation {
                policy_id: policy_id.to_string(),
                suggested_actions: Vec::new(),
                suggested_resources: Vec::new(),
                patch_json: "[]".into(),
                rationale: NO_WILDCARD_RATIONALE.into(),
            });
        }

        let principals = self.principals_with_policy(policy_id);
        if principals.is_empty() {
            return Err(AccessGraphError::NoPrincipals(policy_id.to_string()));
        }

        let targets: Vec<String> = if !target_id.is_empty() {
            vec![target_id.to_string()]
        } else if tags.iter().any(|t| t == "sensitive") {
            self.resources(|n| n.is_sensitive())
        } else {
            self.resources(|_| true)
        };

        // Walk principal → target paths; only paths that traverse the policy
        // count as evidence of this policy's use.
        let mut actions: BTreeSet<String> = BTreeSet::new();
        let mut resources: BTreeSet<String> = BTreeSet::new();
        for principal in &principals {
            for target in &targets {
                let (nodes, edges) =
                    match self.graph.shortest_path(principal, target, DEFAULT_MAX_HOPS) {
                        Ok(path) => path,
                        Err(_) => continue,
                    };
                if !nodes.iter().any(|n| n.id == policy_id) {
                    continue;
                }
                for edge in &edges {
                    if let Some(action) = edge.prop("action") {
                        if !is_wildcard(action) {
                            actions.insert(action.to_string());
                        }
                    }
                }
                resources.insert(target.clone());
            }
        }

        let suggested_actions: Vec<String> = actions.into_iter().take(cap).collect();
        let suggested_resources: Vec<String> = resources.into_iter().take(cap).collect();

        let patch_json = build_patch(&suggested_actions, &suggested_resources)?;

        let rationale = format!(
            "Policy {} contains wildcard permissions. Based on analysis of {} principal(s) \
             accessing {} resource(s), we recommend narrowing to {} specific action(s) and \
             {} resource(s). This follows the principle of least privilege by granting only \
             the permissions actually used.",
            truncate_policy_id(policy_id),
            principals.len(),
            targets.len(),
            suggested_actions.len(),
            suggested_resources.len(),
        );

        Ok(Recommendation {
            policy_id: policy_id.to_string(),
            suggested_actions,
            suggested_resources,
            patch_json,
            rationale,
        })
    }

    /// Principals attached to the policy, in edge-log order.
    fn principals_with_policy(&self, policy_id: &str) -> Vec<String> {
        self.graph
            .edges()
            .into_iter()
            .filter(|e| e.dst == policy_id && ATTACHMENT_KINDS.contains(&e.kind.as_str()))
            .map(|e| e.src)
            .collect()
    }

    fn resources(&self, keep: impl Fn(&Node) -> bool) -> Vec<String> {
        self.graph
            .nodes()
            .into_iter()
            .filter(|n| n.kind == NodeKind::Resource && keep(n))
            .map(|n| n.id)
            .collect()
    }
}

/// RFC 6902 patch replacing the statement's action and resource lists.
/// Either operation is omitted when its set is empty.
fn build_patch(actions: &[String], resources: &[String]) -> AgResult<String> {
    let mut patch: Vec<serde_json::Value> = Vec::new();
    if !actions.is_empty() {
        patch.push(json!({
            "op": "replace",
            "path": "/Statement/0/Action",
            "value": actions,
        }));
    }
    if !resources.is_empty() {
        patch.push(json!({
            "op": "replace",
            "path": "/Statement/0/Resource",
            "value": resources,
        }));
    }
    Ok(serde_json::to_string(&patch)?)
}

/// Whether a policy node's own props carry a wildcard-shaped grant.
fn has_wildcard(policy: &Node) -> bool {
    ["action", "actions", "verbs", "resource", "resources"]
        .iter()
        .filter_map(|key| policy.prop(key))
        .any(is_wildcard)
}

/// Wildcard shapes: `*`, `*:...`, `...:*`, `.../*`.
fn is_wildcard(value: &str) -> bool {
    value == "*" || value.starts_with("*:") || value.ends_with(":*") || value.ends_with("/*")
}

fn truncate_policy_id(id: &str) -> String {
    if id.len() <= 60 {
        id.to_string()
    } else {
        format!("{}...", &id[..57])
    }
}
