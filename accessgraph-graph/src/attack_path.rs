//! Attack-path search: shortest directed path from a principal to a target
//! resource, optionally biased toward sensitive nodes.

use accessgraph_core::{AccessGraphError, AgResult, Edge, Node, DEFAULT_MAX_HOPS};

use crate::graph::Graph;

/// Result of an attack-path query. "No reachable target" is a result
/// (`found == false`), not an error; errors are reserved for bad requests.
#[derive(Debug, Clone, Default)]
pub struct AttackPathResult {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub found: bool,
}

impl AttackPathResult {
    fn not_found() -> Self {
        Self::default()
    }

    fn path(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            nodes,
            edges,
            found: true,
        }
    }

    /// Number of hops (edges) in the found path.
    pub fn hops(&self) -> usize {
        self.edges.len()
    }
}

impl Graph {
    /// Finds the shortest path from `from` to `to`. With an empty `to` and a
    /// `"sensitive"` tag, finds the nearest node marked sensitive instead.
    ///
    /// Unreachability is reported as `found == false`; a request with neither
    /// a target nor a sensitive tag fails with `MissingTarget`.
    pub fn find_attack_path(
        &self,
        from: &str,
        to: &str,
        tags: &[String],
        max_hops: usize,
    ) -> AgResult<AttackPathResult> {
        let max_hops = if max_hops == 0 { DEFAULT_MAX_HOPS } else { max_hops };

        if !self.contains(from) {
            return Err(AccessGraphError::NotFound(format!(
                "source node not found: {from}"
            )));
        }

        if !to.is_empty() {
            if !self.contains(to) {
                return Err(AccessGraphError::NotFound(format!(
                    "destination node not found: {to}"
                )));
            }
            return match self.shortest_path(from, to, max_hops) {
                Ok((nodes, edges)) => Ok(AttackPathResult::path(nodes, edges)),
                // Unreachable or over budget: a negative answer, not a failure.
                Err(AccessGraphError::NoPath) | Err(AccessGraphError::ExceedsMaxHops { .. }) => {
                    Ok(AttackPathResult::not_found())
                }
                Err(e) => Err(e),
            };
        }

        if tags.iter().any(|t| t == "sensitive") {
            return Ok(self.nearest_sensitive(from, max_hops));
        }

        Err(AccessGraphError::MissingTarget)
    }

    /// Shortest path to any sensitive node. Candidates are tried in sorted id
    /// order so ties resolve deterministically.
    fn nearest_sensitive(&self, from: &str, max_hops: usize) -> AttackPathResult {
        let mut best: Option<AttackPathResult> = None;

        for target in self.sensitive_node_ids() {
            let (nodes, edges) = match self.shortest_path(from, &target, max_hops) {
                Ok(path) => path,
                Err(_) => continue,
            };
            let better = match &best {
                Some(current) => nodes.len() < current.nodes.len(),
                None => true,
            };
            if better {
                best = Some(AttackPathResult::path(nodes, edges));
            }
        }

        best.unwrap_or_else(AttackPathResult::not_found)
    }
}
