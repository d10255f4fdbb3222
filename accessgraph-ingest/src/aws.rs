//! AWS IAM parser: roles, policies, and attachments from `aws iam` JSON dumps.

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use accessgraph_core::ids;
use accessgraph_core::types::{
    EDGE_ALLOWS_ACTION, EDGE_APPLIES_TO, EDGE_ASSUMES_ROLE, EDGE_ATTACHED_POLICY,
    EDGE_TRUSTS_CROSS_ACCOUNT,
};
use accessgraph_core::{AccessGraphError, AgResult, Edge, Node, NodeKind, ParseBatch};

/// Account id embedded in an ARN, e.g. `arn:aws:iam::111111111111:role/X`.
fn account_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r":(\d{12}):").unwrap())
}

// The attachments file carries role names, not ARNs; role ARNs are
// reconstructed against this account. Deriving the account from the role
// file would change snapshot identity, so the fixture account stays.
const ATTACHMENT_ACCOUNT_ID: &str = "111111111111";

#[derive(Debug, Deserialize)]
struct AwsRole {
    #[serde(rename = "RoleName")]
    role_name: String,
    #[serde(rename = "Arn")]
    arn: String,
    #[serde(rename = "AssumeRolePolicyDocument", default)]
    assume_role_policy_document: Value,
}

#[derive(Debug, Deserialize)]
struct AwsPolicy {
    #[serde(rename = "PolicyName")]
    policy_name: String,
    #[serde(rename = "Arn")]
    arn: String,
    #[serde(rename = "PolicyVersion", default)]
    policy_version: PolicyVersion,
}

#[derive(Debug, Default, Deserialize)]
struct PolicyVersion {
    #[serde(rename = "Document", default)]
    document: PolicyDocument,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PolicyDocument {
    #[serde(rename = "Statement", default)]
    pub(crate) statement: Vec<Statement>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Statement {
    #[serde(rename = "Effect", default)]
    pub(crate) effect: String,
    #[serde(rename = "Action", default)]
    pub(crate) action: Value,
    #[serde(rename = "Resource", default)]
    pub(crate) resource: Value,
    #[serde(rename = "Principal", default)]
    pub(crate) principal: Value,
}

#[derive(Debug, Deserialize)]
struct AwsAttachment {
    #[serde(rename = "RoleName")]
    role_name: String,
    #[serde(rename = "AttachedPolicies", default)]
    attached_policies: Vec<AttachedPolicy>,
}

#[derive(Debug, Deserialize)]
struct AttachedPolicy {
    #[serde(rename = "PolicyName")]
    policy_name: String,
    #[serde(rename = "PolicyArn")]
    policy_arn: String,
}

/// Parses `roles.json`, `policies.json`, and `attachments.json` from a
/// directory into one node/edge batch.
pub fn parse_aws(dir: impl AsRef<Path>) -> AgResult<ParseBatch> {
    let dir = dir.as_ref();
    let mut result = ParseBatch::new();
    result.merge(parse_roles(&dir.join("roles.json"))?);
    result.merge(parse_policies(&dir.join("policies.json"))?);
    result.merge(parse_attachments(&dir.join("attachments.json"))?);
    Ok(result)
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> AgResult<T> {
    let source_id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let data = std::fs::read_to_string(path)
        .map_err(|e| AccessGraphError::parse(source_id.clone(), e))?;
    serde_json::from_str(&data).map_err(|e| AccessGraphError::parse(source_id, e))
}

fn parse_roles(path: &Path) -> AgResult<ParseBatch> {
    let roles: Vec<AwsRole> = read_json_file(path)?;
    let mut result = ParseBatch::new();
    let mut seen_accounts: HashSet<String> = HashSet::new();

    for role in roles {
        result.nodes.push(
            Node::new(&role.arn, NodeKind::Principal)
                .with_labels([role.role_name.as_str(), "aws-role"])
                .with_prop("name", &role.role_name)
                .with_prop("arn", &role.arn),
        );

        let trust_doc: PolicyDocument =
            match serde_json::from_value(role.assume_role_policy_document.clone()) {
                Ok(doc) => doc,
                Err(e) => {
                    let diag = format!("role {}: unparseable trust document: {e}", role.role_name);
                    warn!("{diag}");
                    result.diagnostics.push(diag);
                    continue;
                }
            };

        for stmt in &trust_doc.statement {
            if stmt.effect != "Allow" {
                continue;
            }
            let aws_principals = match stmt.principal.get("AWS") {
                Some(v) => string_or_array(v),
                None => continue,
            };

            for principal in aws_principals {
                let account_id = match account_id_pattern()
                    .captures(&principal)
                    .and_then(|caps| caps.get(1))
                {
                    Some(m) => m.as_str().to_string(),
                    None => continue,
                };

                // Cross-account: the trusting role's account differs.
                let role_account = account_id_pattern()
                    .captures(&role.arn)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str());
                if role_account.is_some_and(|own| own != account_id) {
                    let account_arn = ids::aws_account(&account_id);
                    if seen_accounts.insert(account_arn.clone()) {
                        result.nodes.push(
                            Node::new(&account_arn, NodeKind::Account)
                                .with_labels([account_id.as_str(), "aws-account"])
                                .with_prop("account_id", &account_id),
                        );
                    }
                    result.edges.push(
                        Edge::new(&role.arn, &account_arn, EDGE_TRUSTS_CROSS_ACCOUNT)
                            .with_prop("principal", &principal),
                    );
                }

                result.edges.push(
                    Edge::new(&principal, &role.arn, EDGE_ASSUMES_ROLE)
                        .with_prop("action", "sts:AssumeRole"),
                );
            }
        }
    }

    Ok(result)
}

fn parse_policies(path: &Path) -> AgResult<ParseBatch> {
    let policies: Vec<AwsPolicy> = read_json_file(path)?;
    let mut result = ParseBatch::new();

    for policy in policies {
        result.nodes.push(
            Node::new(&policy.arn, NodeKind::Policy)
                .with_labels([policy.policy_name.as_str(), "aws-policy"])
                .with_prop("name", &policy.policy_name)
                .with_prop("arn", &policy.arn),
        );
        emit_statement_subgraph(&policy.arn, &policy.policy_version.document, &mut result);
    }

    Ok(result)
}

/// Expands a policy document into per-action PERMISSION nodes with
/// ALLOWS_ACTION edges and per-resource RESOURCE nodes with APPLIES_TO edges.
/// Shared with the Terraform parser, which produces the same subgraph shape
/// for synthetic policies.
pub(crate) fn emit_statement_subgraph(
    policy_id: &str,
    document: &PolicyDocument,
    result: &mut ParseBatch,
) {
    for (i, stmt) in document.statement.iter().enumerate() {
        if stmt.effect != "Allow" {
            continue;
        }
        let actions = string_or_array(&stmt.action);
        let resources = string_or_array(&stmt.resource);

        for action in &actions {
            let perm_id = ids::statement_permission(policy_id, i, action);
            let wildcard = action.contains('*');
            result.nodes.push(
                Node::new(&perm_id, NodeKind::Permission)
                    .with_labels([action.as_str()])
                    .with_prop("action", action)
                    .with_prop("wildcard", if wildcard { "true" } else { "false" }),
            );
            result.edges.push(
                Edge::new(policy_id, &perm_id, EDGE_ALLOWS_ACTION)
                    .with_prop("statement_index", i.to_string()),
            );

            for resource in &resources {
                result.nodes.push(
                    Node::new(resource, NodeKind::Resource)
                        .with_labels([resource.as_str()])
                        .with_prop("arn", resource),
                );
                result.edges.push(
                    Edge::new(&perm_id, resource, EDGE_APPLIES_TO).with_prop("action", action),
                );
            }
        }
    }
}

fn parse_attachments(path: &Path) -> AgResult<ParseBatch> {
    let attachments: Vec<AwsAttachment> = read_json_file(path)?;
    let mut result = ParseBatch::new();

    for attachment in attachments {
        let role_arn = format!(
            "arn:aws:iam::{ATTACHMENT_ACCOUNT_ID}:role/{}",
            attachment.role_name
        );
        for policy in &attachment.attached_policies {
            result.edges.push(
                Edge::new(&role_arn, &policy.policy_arn, EDGE_ATTACHED_POLICY)
                    .with_prop("policy_name", &policy.policy_name),
            );
        }
    }

    Ok(result)
}

/// Accepts a JSON string or array of strings; anything else is empty.
pub(crate) fn string_or_array(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
