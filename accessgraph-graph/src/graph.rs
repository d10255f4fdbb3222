//! The directed multigraph and its traversal primitives.
//!
//! Nodes live in an id-keyed map and adjacency structures refer to them by
//! id, so the inherently cyclic access graph (role → role, role → resource →
//! role via trust) never forms value cycles. Adjacency lists keep distinct
//! neighbors in first-insertion order, which makes every traversal
//! deterministic for a given insertion order.

use std::collections::{HashMap, HashSet, VecDeque};

use accessgraph_core::{
    AccessGraphError, AgResult, Edge, Node, NodeKind, DEFAULT_BFS_DEPTH, DEFAULT_MAX_HOPS,
};

/// Per-source adjacency: distinct destinations in first-insertion order,
/// with every parallel edge kept per destination.
#[derive(Debug, Default)]
struct Adjacency {
    order: Vec<String>,
    edges: HashMap<String, Vec<Edge>>,
}

/// In-memory directed multigraph representing exactly one snapshot.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: HashMap<String, Node>,
    node_order: Vec<String>,
    out: HashMap<String, Adjacency>,
    /// Distinct predecessors per node, first-insertion order.
    inc: HashMap<String, Vec<String>>,
    /// Ordered edge log for enumeration and diffing.
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Mutation ───────────────────────────────────────────────────────────

    /// Inserts a node. A second insert for an existing id is a no-op and does
    /// not mutate props: parsers supply complete props on first sight.
    pub fn add_node(&mut self, node: Node) {
        if self.nodes.contains_key(&node.id) {
            return;
        }
        self.node_order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
    }

    /// Appends an edge. Both endpoints must already be present.
    pub fn add_edge(&mut self, edge: Edge) -> AgResult<()> {
        if !self.nodes.contains_key(&edge.src) || !self.nodes.contains_key(&edge.dst) {
            return Err(AccessGraphError::MissingEndpoint {
                src: edge.src,
                dst: edge.dst,
            });
        }

        let adjacency = self.out.entry(edge.src.clone()).or_default();
        let parallel = adjacency.edges.entry(edge.dst.clone()).or_default();
        if parallel.is_empty() {
            adjacency.order.push(edge.dst.clone());
        }
        parallel.push(edge.clone());

        let predecessors = self.inc.entry(edge.dst.clone()).or_default();
        if !predecessors.contains(&edge.src) {
            predecessors.push(edge.src.clone());
        }

        self.edges.push(edge);
        Ok(())
    }

    /// Sets `props["sensitive"] = "true"` on the in-memory node. This is a
    /// per-session annotation; it never writes back to storage.
    pub fn mark_sensitive(&mut self, id: &str) -> AgResult<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| AccessGraphError::NotFound(format!("node not found: {id}")))?;
        node.props.insert("sensitive".into(), "true".into());
        Ok(())
    }

    // ── Lookup ─────────────────────────────────────────────────────────────

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All nodes in insertion order. Returns a materialized copy so exporters
    /// never observe internal mutation.
    pub fn nodes(&self) -> Vec<Node> {
        self.node_order
            .iter()
            .map(|id| self.nodes[id].clone())
            .collect()
    }

    /// All edges in insertion order, materialized.
    pub fn edges(&self) -> Vec<Edge> {
        self.edges.clone()
    }

    /// The first edge inserted between `src` and `dst`, if any. This is the
    /// documented tie-break when a traversal needs "the" edge for a hop and
    /// parallel edges exist.
    pub fn first_edge(&self, src: &str, dst: &str) -> Option<&Edge> {
        self.out
            .get(src)
            .and_then(|adj| adj.edges.get(dst))
            .and_then(|parallel| parallel.first())
    }

    /// The first edge between a pair, as an error-reporting lookup.
    pub fn edge_details(&self, src: &str, dst: &str) -> AgResult<&Edge> {
        self.first_edge(src, dst).ok_or_else(|| {
            AccessGraphError::NotFound(format!("edge not found from {src} to {dst}"))
        })
    }

    /// Ids of all nodes marked sensitive, sorted ascending.
    pub fn sensitive_node_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .nodes
            .values()
            .filter(|n| n.is_sensitive())
            .map(|n| n.id.clone())
            .collect();
        ids.sort();
        ids
    }

    // ── Traversal ──────────────────────────────────────────────────────────

    /// Union of outbound and inbound neighbors, one entry per traversed edge,
    /// each paired with that edge's kind. An empty `kinds` filter admits
    /// every neighbor kind.
    pub fn neighbors(&self, id: &str, kinds: &[NodeKind]) -> AgResult<Vec<(Node, String)>> {
        if !self.nodes.contains_key(id) {
            return Err(AccessGraphError::NotFound(format!("node not found: {id}")));
        }

        let admits = |node: &Node| kinds.is_empty() || kinds.contains(&node.kind);
        let mut result = Vec::new();

        if let Some(adjacency) = self.out.get(id) {
            for dst in &adjacency.order {
                let neighbor = &self.nodes[dst];
                if !admits(neighbor) {
                    continue;
                }
                for edge in &adjacency.edges[dst] {
                    result.push((neighbor.clone(), edge.kind.clone()));
                }
            }
        }

        if let Some(predecessors) = self.inc.get(id) {
            for src in predecessors {
                let neighbor = &self.nodes[src];
                if !admits(neighbor) {
                    continue;
                }
                if let Some(adjacency) = self.out.get(src) {
                    if let Some(parallel) = adjacency.edges.get(id) {
                        for edge in parallel {
                            result.push((neighbor.clone(), edge.kind.clone()));
                        }
                    }
                }
            }
        }

        Ok(result)
    }

    /// Unweighted shortest directed path by BFS layering, terminating as soon
    /// as `to` is dequeued. `max_hops <= 0` is replaced with the default of 8
    /// (callers pass 0 for "default").
    ///
    /// Returns `(nodes, edges)` with `nodes.len() == edges.len() + 1`.
    pub fn shortest_path(
        &self,
        from: &str,
        to: &str,
        max_hops: usize,
    ) -> AgResult<(Vec<Node>, Vec<Edge>)> {
        if !self.nodes.contains_key(from) {
            return Err(AccessGraphError::NotFound(format!(
                "source node not found: {from}"
            )));
        }
        if !self.nodes.contains_key(to) {
            return Err(AccessGraphError::NotFound(format!(
                "destination node not found: {to}"
            )));
        }
        let max_hops = if max_hops == 0 { DEFAULT_MAX_HOPS } else { max_hops };

        // BFS with a visited set; cycles are therefore safe.
        let mut parent: HashMap<&str, &str> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        visited.insert(from);
        queue.push_back(from);

        let mut found = from == to;
        while let Some(current) = queue.pop_front() {
            if current == to {
                found = true;
                break;
            }
            if let Some(adjacency) = self.out.get(current) {
                for dst in &adjacency.order {
                    if visited.insert(dst.as_str()) {
                        parent.insert(dst.as_str(), current);
                        queue.push_back(dst.as_str());
                    }
                }
            }
        }

        if !found {
            return Err(AccessGraphError::NoPath);
        }

        // Reconstruct the id path back from the destination.
        let mut ids = vec![to];
        let mut cursor = to;
        while let Some(&prev) = parent.get(cursor) {
            ids.push(prev);
            cursor = prev;
        }
        ids.reverse();

        if ids.len() - 1 > max_hops {
            return Err(AccessGraphError::ExceedsMaxHops {
                hops: ids.len() - 1,
                max_hops,
            });
        }

        let nodes: Vec<Node> = ids.iter().map(|id| self.nodes[*id].clone()).collect();
        let edges: Vec<Edge> = ids
            .windows(2)
            .map(|pair| {
                self.first_edge(pair[0], pair[1])
                    .cloned()
                    .expect("BFS traversed a missing edge")
            })
            .collect();

        Ok((nodes, edges))
    }

    /// Breadth-first exploration returning visited nodes in encounter order.
    /// `max_depth <= 0` is replaced with the default of 3.
    pub fn bfs(&self, start: &str, max_depth: usize) -> AgResult<Vec<Node>> {
        if !self.nodes.contains_key(start) {
            return Err(AccessGraphError::NotFound(format!(
                "start node not found: {start}"
            )));
        }
        let max_depth = if max_depth == 0 { DEFAULT_BFS_DEPTH } else { max_depth };

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
        let mut result = Vec::new();

        visited.insert(start);
        queue.push_back((start, 0));

        while let Some((current, depth)) = queue.pop_front() {
            result.push(self.nodes[current].clone());
            if depth >= max_depth {
                continue;
            }
            if let Some(adjacency) = self.out.get(current) {
                for dst in &adjacency.order {
                    if visited.insert(dst.as_str()) {
                        queue.push_back((dst.as_str(), depth + 1));
                    }
                }
            }
        }

        Ok(result)
    }
}
