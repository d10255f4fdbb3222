//! Terraform plan parser: synthetic policy nodes for planned IAM policies
//! and for updates that widen an existing policy with a wildcard.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use accessgraph_core::ids;
use accessgraph_core::{AccessGraphError, AgResult, Node, NodeKind, ParseBatch};

use crate::aws::{emit_statement_subgraph, PolicyDocument};

#[derive(Debug, Default, Deserialize)]
struct TerraformPlan {
    #[serde(default)]
    planned_values: PlannedValues,
    #[serde(default)]
    resource_changes: Vec<ResourceChange>,
}

#[derive(Debug, Default, Deserialize)]
struct PlannedValues {
    #[serde(default)]
    root_module: RootModule,
}

#[derive(Debug, Default, Deserialize)]
struct RootModule {
    #[serde(default)]
    resources: Vec<TfResource>,
}

#[derive(Debug, Default, Deserialize)]
struct TfResource {
    #[serde(default)]
    address: String,
    #[serde(rename = "type", default)]
    resource_type: String,
    #[serde(default)]
    values: Value,
}

#[derive(Debug, Default, Deserialize)]
struct ResourceChange {
    #[serde(default)]
    address: String,
    #[serde(rename = "type", default)]
    resource_type: String,
    #[serde(default)]
    change: Change,
}

#[derive(Debug, Default, Deserialize)]
struct Change {
    #[serde(default)]
    actions: Vec<String>,
    #[serde(default)]
    before: Value,
    #[serde(default)]
    after: Value,
}

/// Parses a Terraform plan JSON file. The second return value reports
/// whether the plan existed: a missing file is not an error and yields an
/// empty batch with `exists == false`.
pub fn parse_terraform(path: impl AsRef<Path>) -> AgResult<(ParseBatch, bool)> {
    let path = path.as_ref();
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok((ParseBatch::new(), false));
        }
        Err(e) => return Err(AccessGraphError::parse(path.display().to_string(), e)),
    };

    let plan: TerraformPlan = serde_json::from_str(&data)
        .map_err(|e| AccessGraphError::parse(path.display().to_string(), e))?;

    let mut result = ParseBatch::new();

    // Planned IAM policies get the same statement subgraph the IAM parser
    // would produce, under a synthetic tf: identity.
    for resource in &plan.planned_values.root_module.resources {
        if resource.resource_type != "aws_iam_policy" {
            continue;
        }
        if let Some(policy_json) = resource.values.get("policy").and_then(Value::as_str) {
            emit_policy(&resource.address, policy_json, &mut result);
        }
    }

    // Updates that introduce a wildcard the before-document lacked.
    for change in &plan.resource_changes {
        if change.resource_type != "aws_iam_policy"
            || !change.change.actions.iter().any(|a| a == "update")
        {
            continue;
        }
        let before = change.change.before.get("policy").and_then(Value::as_str).unwrap_or("");
        let after = change.change.after.get("policy").and_then(Value::as_str).unwrap_or("");
        if before.is_empty() || after.is_empty() {
            continue;
        }
        if !before.contains(":*") && after.contains(":*") {
            emit_policy(&format!("{}#expanded", change.address), after, &mut result);
        }
    }

    Ok((result, true))
}

fn emit_policy(address: &str, policy_json: &str, result: &mut ParseBatch) {
    let document: PolicyDocument = match serde_json::from_str(policy_json) {
        Ok(document) => document,
        Err(e) => {
            let diag = format!("terraform {address}: undecodable policy document: {e}");
            warn!("{diag}");
            result.diagnostics.push(diag);
            return;
        }
    };

    let policy_id = ids::terraform_policy(address);
    result.nodes.push(
        Node::new(&policy_id, NodeKind::Policy)
            .with_labels([address, "terraform"])
            .with_prop("address", address)
            .with_prop("source", "terraform"),
    );
    emit_statement_subgraph(&policy_id, &document, result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use accessgraph_core::types::{EDGE_ALLOWS_ACTION, EDGE_APPLIES_TO};
    use std::fs;

    fn parse_plan(json: &str) -> ParseBatch {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        fs::write(&path, json).unwrap();
        let (batch, exists) = parse_terraform(&path).unwrap();
        assert!(exists);
        batch
    }

    #[test]
    fn test_missing_plan_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (batch, exists) = parse_terraform(dir.path().join("absent.json")).unwrap();
        assert!(!exists);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_planned_policy_subgraph() {
        let batch = parse_plan(
            r#"{
                "format_version": "1.1",
                "planned_values": {
                    "root_module": {
                        "resources": [{
                            "address": "aws_iam_policy.wide",
                            "type": "aws_iam_policy",
                            "name": "wide",
                            "values": {
                                "policy": "{\"Statement\":[{\"Effect\":\"Allow\",\"Action\":\"s3:*\",\"Resource\":\"arn:aws:s3:::data\"}]}"
                            }
                        }]
                    }
                },
                "resource_changes": []
            }"#,
        );

        let policy = batch
            .nodes
            .iter()
            .find(|n| n.id == "tf:aws_iam_policy.wide")
            .unwrap();
        assert_eq!(policy.kind, NodeKind::Policy);
        assert_eq!(policy.prop("source"), Some("terraform"));
        assert_eq!(policy.labels, vec!["aws_iam_policy.wide", "terraform"]);

        let perm = batch
            .nodes
            .iter()
            .find(|n| n.id == "tf:aws_iam_policy.wide#stmt0#s3:*")
            .unwrap();
        assert_eq!(perm.prop("wildcard"), Some("true"));

        assert!(batch.edges.iter().any(|e| e.kind == EDGE_ALLOWS_ACTION));
        assert!(batch
            .edges
            .iter()
            .any(|e| e.kind == EDGE_APPLIES_TO && e.dst == "arn:aws:s3:::data"));
    }

    #[test]
    fn test_wildcard_expansion_delta() {
        let batch = parse_plan(
            r#"{
                "planned_values": {"root_module": {"resources": []}},
                "resource_changes": [{
                    "address": "aws_iam_policy.grows",
                    "type": "aws_iam_policy",
                    "change": {
                        "actions": ["update"],
                        "before": {"policy": "{\"Statement\":[{\"Effect\":\"Allow\",\"Action\":\"s3:GetObject\",\"Resource\":\"*\"}]}"},
                        "after": {"policy": "{\"Statement\":[{\"Effect\":\"Allow\",\"Action\":\"s3:*\",\"Resource\":\"*\"}]}"}
                    }
                }]
            }"#,
        );

        assert!(batch
            .nodes
            .iter()
            .any(|n| n.id == "tf:aws_iam_policy.grows#expanded"));
    }

    #[test]
    fn test_no_delta_when_wildcard_already_present() {
        let batch = parse_plan(
            r#"{
                "planned_values": {"root_module": {"resources": []}},
                "resource_changes": [{
                    "address": "aws_iam_policy.stable",
                    "type": "aws_iam_policy",
                    "change": {
                        "actions": ["update"],
                        "before": {"policy": "{\"Statement\":[{\"Effect\":\"Allow\",\"Action\":\"s3:*\",\"Resource\":\"*\"}]}"},
                        "after": {"policy": "{\"Statement\":[{\"Effect\":\"Allow\",\"Action\":\"s3:*\",\"Resource\":\"arn:aws:s3:::data\"}]}"}
                    }
                }]
            }"#,
        );
        assert!(batch.is_empty());
    }

    #[test]
    fn test_non_update_changes_ignored() {
        let batch = parse_plan(
            r#"{
                "planned_values": {"root_module": {"resources": []}},
                "resource_changes": [{
                    "address": "aws_iam_policy.fresh",
                    "type": "aws_iam_policy",
                    "change": {
                        "actions": ["create"],
                        "before": null,
                        "after": {"policy": "{\"Statement\":[{\"Effect\":\"Allow\",\"Action\":\"s3:*\",\"Resource\":\"*\"}]}"}
                    }
                }]
            }"#,
        );
        assert!(batch.is_empty());
    }

    #[test]
    fn test_undecodable_embedded_policy_is_a_diagnostic() {
        let batch = parse_plan(
            r#"{
                "planned_values": {
                    "root_module": {
                        "resources": [{
                            "address": "aws_iam_policy.bad",
                            "type": "aws_iam_policy",
                            "values": {"policy": "{not json"}
                        }]
                    }
                },
                "resource_changes": []
            }"#,
        );
        assert!(batch.nodes.is_empty());
        assert_eq!(batch.diagnostics.len(), 1);
    }

    #[test]
    fn test_malformed_plan_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        fs::write(&path, "{broken").unwrap();
        assert!(matches!(
            parse_terraform(&path),
            Err(AccessGraphError::ParseMalformed { .. })
        ));
    }
}
