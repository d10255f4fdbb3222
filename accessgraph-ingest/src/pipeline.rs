//! The ingest write path: parsers → graph → snapshot store.

use std::path::PathBuf;

use tracing::{info, warn};

use accessgraph_core::{redact, AccessGraphError, AgResult, CancelToken, ParseBatch};
use accessgraph_graph::Graph;
use accessgraph_store::SnapshotStore;

use crate::{parse_aws, parse_k8s, parse_terraform};

/// Which sources to ingest. Every field is optional; requesting nothing
/// produces an empty snapshot.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub aws_dir: Option<PathBuf>,
    pub k8s_dir: Option<PathBuf>,
    pub tf_plan: Option<PathBuf>,
}

/// What an ingest run produced.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub snapshot_id: String,
    pub label: String,
    pub node_count: usize,
    pub edge_count: usize,
    /// Edges whose endpoints never materialized (cross-source references).
    pub dropped_edges: usize,
    /// Per-source failures that did not abort the run.
    pub source_errors: Vec<String>,
    /// Per-record diagnostics accumulated by the parsers.
    pub diagnostics: Vec<String>,
}

/// Runs the requested parsers, merges their batches, builds the graph, and
/// persists it under `snapshot_id`.
///
/// A failing source records an error and the others still ingest; the run
/// fails only when every requested source failed (or the save itself fails).
/// When Terraform plan data contributed, the snapshot label is suffixed
/// `-iac` to mark the infrastructure-as-code enrichment.
pub fn run_ingest(
    store: &SnapshotStore,
    token: &CancelToken,
    snapshot_id: &str,
    options: &IngestOptions,
) -> AgResult<IngestReport> {
    token.check()?;

    let mut batch = ParseBatch::new();
    let mut source_errors: Vec<String> = Vec::new();
    let mut requested = 0usize;
    let mut label = snapshot_id.to_string();

    if let Some(aws_dir) = &options.aws_dir {
        requested += 1;
        match parse_aws(aws_dir) {
            Ok(parsed) => {
                info!(nodes = parsed.nodes.len(), edges = parsed.edges.len(), "parsed AWS IAM");
                batch.merge(parsed);
            }
            Err(e) => {
                warn!("AWS parse failed: {}", redact(&e.to_string()));
                source_errors.push(format!("aws: {e}"));
            }
        }
    }

    if let Some(k8s_dir) = &options.k8s_dir {
        requested += 1;
        match parse_k8s(k8s_dir) {
            Ok(parsed) => {
                info!(nodes = parsed.nodes.len(), edges = parsed.edges.len(), "parsed Kubernetes RBAC");
                batch.merge(parsed);
            }
            Err(e) => {
                warn!("Kubernetes parse failed: {}", redact(&e.to_string()));
                source_errors.push(format!("k8s: {e}"));
            }
        }
    }

    if let Some(tf_plan) = &options.tf_plan {
        requested += 1;
        match parse_terraform(tf_plan) {
            Ok((parsed, exists)) => {
                if exists {
                    info!(nodes = parsed.nodes.len(), edges = parsed.edges.len(), "parsed Terraform plan");
                    batch.merge(parsed);
                    label = format!("{snapshot_id}-iac");
                }
            }
            Err(e) => {
                warn!("Terraform parse failed: {}", redact(&e.to_string()));
                source_errors.push(format!("terraform: {e}"));
            }
        }
    }

    if requested > 0 && source_errors.len() == requested {
        return Err(AccessGraphError::ParseMalformed {
            source_id: "ingest".into(),
            detail: source_errors.join("; "),
        });
    }

    token.check()?;

    // The graph dedups nodes (first write wins) and validates edge endpoints.
    let mut graph = Graph::new();
    for node in batch.nodes {
        graph.add_node(node);
    }
    let mut dropped_edges = 0usize;
    for edge in batch.edges {
        if let Err(AccessGraphError::MissingEndpoint { src, dst }) = graph.add_edge(edge) {
            dropped_edges += 1;
            warn!("dropped edge with missing endpoint: {}", redact(&format!("{src} -> {dst}")));
        }
    }

    store.save_snapshot(token, snapshot_id, &label, &graph)?;
    info!(
        snapshot = %snapshot_id,
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        dropped = dropped_edges,
        "ingest complete"
    );

    Ok(IngestReport {
        snapshot_id: snapshot_id.to_string(),
        label,
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        dropped_edges,
        source_errors,
        diagnostics: batch.diagnostics,
    })
}
