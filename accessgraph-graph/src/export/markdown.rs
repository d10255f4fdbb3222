//! Markdown attack-path report.

use std::fmt::Write;

use accessgraph_core::{Edge, Node};

/// Renders an attack path as a Markdown report: header, numbered step list,
/// risk annotations for wildcard and cross-account hops, and remediation
/// guidance. An empty path yields a header-only document.
pub fn export_markdown_attack_path(
    from: &str,
    to: &str,
    nodes: &[Node],
    edges: &[Edge],
) -> String {
    let mut out = String::new();
    let hops = nodes.len().saturating_sub(1);

    out.push_str("# Attack Path Report\n\n");
    let _ = writeln!(out, "- **Source:** `{from}`");
    let _ = writeln!(out, "- **Target:** `{to}`");
    let _ = writeln!(out, "- **Hops:** {hops}");

    if nodes.is_empty() {
        return out;
    }

    out.push_str("\n## Path\n\n");
    for (i, node) in nodes.iter().enumerate() {
        let _ = writeln!(out, "{}. `{}` [{}]", i + 1, node.id, node.kind);
        if let Some(edge) = edges.get(i) {
            let _ = writeln!(out, "   --[{}]-->", edge.kind);
        }
    }

    out.push_str("\n## Risk Annotations\n\n");
    let mut annotations = Vec::new();
    for (i, edge) in edges.iter().enumerate() {
        if edge.kind == "TRUSTS_CROSS_ACCOUNT" || edge.prop("cross_account") == Some("true") {
            annotations.push(format!(
                "- Step {}: cross-account trust `{}` -> `{}`",
                i + 1,
                edge.src,
                edge.dst
            ));
        }
        if let Some(action) = edge.prop("action") {
            if action.contains('*') {
                annotations.push(format!(
                    "- Step {}: wildcard action `{}` on `{}` -> `{}`",
                    i + 1,
                    action,
                    edge.src,
                    edge.dst
                ));
            }
        }
    }
    if annotations.is_empty() {
        out.push_str("No wildcard or cross-account edges detected on this path.\n");
    } else {
        for line in &annotations {
            out.push_str(line);
            out.push('\n');
        }
    }

    out.push_str("\n## Remediation\n\n");
    out.push_str(
        "Review each grant along this path and restrict it to the minimum \
         required access: replace wildcard actions with the specific operations \
         in use, scope resources to the assets each principal actually touches, \
         and constrain cross-account trust with external-id conditions. Re-run \
         the attack-path query after each change to confirm the path is broken.\n",
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use accessgraph_core::NodeKind;

    fn fixture() -> (Vec<Node>, Vec<Edge>) {
        let nodes = vec![
            Node::new("DevRole", NodeKind::Principal),
            Node::new("DataAccess", NodeKind::Policy),
            Node::new("data-bkt", NodeKind::Resource),
        ];
        let edges = vec![
            Edge::new("DevRole", "DataAccess", "ATTACHED_POLICY"),
            Edge::new("DataAccess", "data-bkt", "APPLIES_TO").with_prop("action", "s3:*"),
        ];
        (nodes, edges)
    }

    #[test]
    fn test_report_structure() {
        let (nodes, edges) = fixture();
        let md = export_markdown_attack_path("DevRole", "data-bkt", &nodes, &edges);

        assert!(md.starts_with("# Attack Path Report"));
        assert!(md.contains("- **Source:** `DevRole`"));
        assert!(md.contains("- **Target:** `data-bkt`"));
        assert!(md.contains("- **Hops:** 2"));
        assert!(md.contains("1. `DevRole` [PRINCIPAL]"));
        assert!(md.contains("--[ATTACHED_POLICY]-->"));
        assert!(md.contains("3. `data-bkt` [RESOURCE]"));
        assert!(md.contains("wildcard action `s3:*`"));
        assert!(md.contains("## Remediation"));
    }

    #[test]
    fn test_cross_account_annotation() {
        let nodes = vec![
            Node::new("role", NodeKind::Principal),
            Node::new("arn:aws:iam::222222222222:root", NodeKind::Account),
        ];
        let edges = vec![Edge::new(
            "role",
            "arn:aws:iam::222222222222:root",
            "TRUSTS_CROSS_ACCOUNT",
        )];
        let md = export_markdown_attack_path("role", "arn:aws:iam::222222222222:root", &nodes, &edges);
        assert!(md.contains("cross-account trust"));
    }

    #[test]
    fn test_clean_path_reports_no_annotations() {
        let nodes = vec![
            Node::new("a", NodeKind::Principal),
            Node::new("b", NodeKind::Resource),
        ];
        let edges = vec![Edge::new("a", "b", "HAS_ACCESS").with_prop("action", "s3:GetObject")];
        let md = export_markdown_attack_path("a", "b", &nodes, &edges);
        assert!(md.contains("No wildcard or cross-account edges detected"));
    }

    #[test]
    fn test_empty_path_is_header_only() {
        let md = export_markdown_attack_path("a", "b", &[], &[]);
        assert!(md.contains("# Attack Path Report"));
        assert!(md.contains("- **Hops:** 0"));
        assert!(!md.contains("## Path"));
    }

    #[test]
    fn test_byte_identical_for_equal_inputs() {
        let (nodes, edges) = fixture();
        let a = export_markdown_attack_path("DevRole", "data-bkt", &nodes, &edges);
        let b = export_markdown_attack_path("DevRole", "data-bkt", &nodes, &edges);
        assert_eq!(a, b);
    }
}
