//! Canonical identifier construction.
//!
//! Identifier construction is a total function of the parsed inputs: no
//! timestamps or random values participate, so two ingests of the same
//! documents always agree on node identity.

/// AWS account node id: `arn:aws:iam::<account>:root`.
pub fn aws_account(account_id: &str) -> String {
    format!("arn:aws:iam::{account_id}:root")
}

/// Per-statement permission node id: `<policyArn>#stmt<i>#<action>`.
/// Stable given sorted statement order within the source document.
pub fn statement_permission(policy_arn: &str, statement_index: usize, action: &str) -> String {
    format!("{policy_arn}#stmt{statement_index}#{action}")
}

/// Kubernetes ServiceAccount: `k8s:sa:<ns>:<name>`.
pub fn k8s_service_account(namespace: &str, name: &str) -> String {
    format!("k8s:sa:{namespace}:{name}")
}

/// Kubernetes Namespace: `k8s:ns:<name>`.
pub fn k8s_namespace(name: &str) -> String {
    format!("k8s:ns:{name}")
}

/// Kubernetes role id: `k8s:role:<name>` for cluster-scoped roles,
/// `k8s:role:<ns>:<name>` for namespaced ones.
pub fn k8s_role(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("k8s:role:{ns}:{name}"),
        _ => format!("k8s:role:{name}"),
    }
}

/// Kubernetes binding id: `k8s:binding:<name>`.
pub fn k8s_binding(name: &str) -> String {
    format!("k8s:binding:{name}")
}

/// Kubernetes NetworkPolicy id: `k8s:netpol:<ns>:<name>`.
pub fn k8s_network_policy(namespace: &str, name: &str) -> String {
    format!("k8s:netpol:{namespace}:{name}")
}

/// Non-ServiceAccount binding subject: `k8s:<kind-lowercased>:<name>`.
pub fn k8s_subject(kind: &str, name: &str) -> String {
    format!("k8s:{}:{}", kind.to_lowercase(), name)
}

/// Per-rule permission node id: `<roleId>#rule<i>#<verb>#<resource>`.
pub fn rule_permission(role_id: &str, rule_index: usize, verb: &str, resource: &str) -> String {
    format!("{role_id}#rule{rule_index}#{verb}#{resource}")
}

/// Terraform-derived policy id: `tf:<resourceAddress>`.
pub fn terraform_policy(address: &str) -> String {
    format!("tf:{address}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_shapes() {
        assert_eq!(aws_account("222222222222"), "arn:aws:iam::222222222222:root");
        assert_eq!(
            statement_permission("arn:aws:iam::1:policy/P", 0, "s3:*"),
            "arn:aws:iam::1:policy/P#stmt0#s3:*"
        );
        assert_eq!(k8s_service_account("default", "test-sa"), "k8s:sa:default:test-sa");
        assert_eq!(k8s_namespace("default"), "k8s:ns:default");
        assert_eq!(k8s_role(None, "cluster-admin"), "k8s:role:cluster-admin");
        assert_eq!(k8s_role(Some("dev"), "reader"), "k8s:role:dev:reader");
        assert_eq!(k8s_role(Some(""), "reader"), "k8s:role:reader");
        assert_eq!(k8s_binding("test-binding"), "k8s:binding:test-binding");
        assert_eq!(k8s_subject("User", "alice"), "k8s:user:alice");
        assert_eq!(
            rule_permission("k8s:role:cluster-admin", 0, "*", "*"),
            "k8s:role:cluster-admin#rule0#*#*"
        );
        assert_eq!(
            terraform_policy("aws_iam_policy.wide"),
            "tf:aws_iam_policy.wide"
        );
    }
}
