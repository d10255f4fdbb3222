//! SQLite persistence for graph snapshots.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use accessgraph_core::{AccessGraphError, AgResult, CancelToken, Edge, Node, NodeKind};
use accessgraph_graph::Graph;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS snapshots (
    id         TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    label      TEXT
);

CREATE TABLE IF NOT EXISTS nodes (
    snapshot_id TEXT NOT NULL,
    id          TEXT NOT NULL,
    kind        TEXT NOT NULL,
    labels      TEXT NOT NULL,
    props       TEXT NOT NULL,
    PRIMARY KEY (snapshot_id, id)
);

CREATE TABLE IF NOT EXISTS edges (
    snapshot_id TEXT NOT NULL,
    src         TEXT NOT NULL,
    dst         TEXT NOT NULL,
    kind        TEXT NOT NULL,
    props       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_nodes_snapshot_kind ON nodes (snapshot_id, kind);
CREATE INDEX IF NOT EXISTS idx_nodes_snapshot_id   ON nodes (snapshot_id, id);
CREATE INDEX IF NOT EXISTS idx_edges_snapshot      ON edges (snapshot_id);
"#;

const DEFAULT_SEARCH_LIMIT: usize = 10;

/// A saved snapshot's identity row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMeta {
    pub id: String,
    /// ISO-8601 UTC, second precision, captured at commit time.
    pub created_at: String,
    pub label: Option<String>,
}

/// SQLite-backed snapshot repository. The connection handle is owned for the
/// store's lifetime and released on drop.
pub struct SnapshotStore {
    conn: Mutex<Connection>,
}

impl SnapshotStore {
    /// Opens (or creates) the database and applies the schema.
    pub fn open(path: impl AsRef<Path>) -> AgResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(AccessGraphError::storage)?;
        conn.execute_batch(SCHEMA).map_err(AccessGraphError::storage)?;
        info!(path = %path.as_ref().display(), "snapshot store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests and ephemeral analysis runs.
    pub fn open_in_memory() -> AgResult<Self> {
        let conn = Connection::open_in_memory().map_err(AccessGraphError::storage)?;
        conn.execute_batch(SCHEMA).map_err(AccessGraphError::storage)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ── Write path ─────────────────────────────────────────────────────────

    /// Persists a graph under `id` in a single transaction. On any failure
    /// the transaction rolls back and the snapshot is not observable.
    pub fn save_snapshot(
        &self,
        token: &CancelToken,
        id: &str,
        label: &str,
        graph: &Graph,
    ) -> AgResult<()> {
        token.check()?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(AccessGraphError::storage)?;

        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        tx.execute(
            "INSERT INTO snapshots (id, created_at, label) VALUES (?1, ?2, ?3)",
            params![id, created_at, label],
        )
        .map_err(AccessGraphError::storage)?;

        {
            let mut insert_node = tx
                .prepare(
                    "INSERT INTO nodes (snapshot_id, id, kind, labels, props)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(AccessGraphError::storage)?;
            for node in graph.nodes() {
                token.check()?;
                let labels = serde_json::to_string(&node.labels)?;
                let props = serde_json::to_string(&node.props)?;
                insert_node
                    .execute(params![id, node.id, node.kind.as_str(), labels, props])
                    .map_err(|e| {
                        AccessGraphError::Storage(format!("inserting node {}: {e}", node.id))
                    })?;
            }

            let mut insert_edge = tx
                .prepare(
                    "INSERT INTO edges (snapshot_id, src, dst, kind, props)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(AccessGraphError::storage)?;
            for edge in graph.edges() {
                token.check()?;
                let props = serde_json::to_string(&edge.props)?;
                insert_edge
                    .execute(params![id, edge.src, edge.dst, edge.kind, props])
                    .map_err(|e| {
                        AccessGraphError::Storage(format!(
                            "inserting edge {} -> {}: {e}",
                            edge.src, edge.dst
                        ))
                    })?;
            }
        }

        tx.commit().map_err(AccessGraphError::storage)?;
        info!(
            snapshot = %id,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "snapshot saved"
        );
        Ok(())
    }

    // ── Read path ──────────────────────────────────────────────────────────

    /// Rebuilds the in-memory graph for a snapshot. Nodes are read in
    /// ascending id order and edges in ascending `(src, dst, kind)` order so
    /// the rebuilt graph is identical across loads. Edges whose endpoints are
    /// missing from the loaded node set are dropped (defensive; the write
    /// path makes this impossible).
    pub fn load_snapshot(&self, token: &CancelToken, id: &str) -> AgResult<Graph> {
        token.check()?;
        self.get_snapshot(token, id)?;

        let conn = self.conn.lock();
        let mut graph = Graph::new();

        let mut stmt = conn
            .prepare(
                "SELECT id, kind, labels, props FROM nodes
                 WHERE snapshot_id = ?1 ORDER BY id",
            )
            .map_err(AccessGraphError::storage)?;
        let mut rows = stmt.query(params![id]).map_err(AccessGraphError::storage)?;
        while let Some(row) = rows.next().map_err(AccessGraphError::storage)? {
            token.check()?;
            graph.add_node(decode_node(row)?);
        }

        let mut stmt = conn
            .prepare(
                "SELECT src, dst, kind, props FROM edges
                 WHERE snapshot_id = ?1 ORDER BY src, dst, kind",
            )
            .map_err(AccessGraphError::storage)?;
        let mut rows = stmt.query(params![id]).map_err(AccessGraphError::storage)?;
        while let Some(row) = rows.next().map_err(AccessGraphError::storage)? {
            token.check()?;
            let edge = decode_edge(row)?;
            if let Err(AccessGraphError::MissingEndpoint { src, dst }) = graph.add_edge(edge) {
                debug!(%src, %dst, snapshot = %id, "dropped edge with missing endpoint");
            }
        }

        Ok(graph)
    }

    /// All snapshots, newest first.
    pub fn list_snapshots(&self, token: &CancelToken) -> AgResult<Vec<SnapshotMeta>> {
        token.check()?;
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, created_at, label FROM snapshots ORDER BY created_at DESC")
            .map_err(AccessGraphError::storage)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(SnapshotMeta {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    label: row.get(2)?,
                })
            })
            .map_err(AccessGraphError::storage)?;

        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row.map_err(AccessGraphError::storage)?);
        }
        Ok(snapshots)
    }

    pub fn get_snapshot(&self, token: &CancelToken, id: &str) -> AgResult<SnapshotMeta> {
        token.check()?;
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, created_at, label FROM snapshots WHERE id = ?1",
            params![id],
            |row| {
                Ok(SnapshotMeta {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    label: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(AccessGraphError::storage)?
        .ok_or_else(|| AccessGraphError::NotFound(format!("snapshot not found: {id}")))
    }

    pub fn count_nodes(&self, token: &CancelToken, snapshot_id: &str) -> AgResult<usize> {
        self.count(token, "nodes", snapshot_id)
    }

    pub fn count_edges(&self, token: &CancelToken, snapshot_id: &str) -> AgResult<usize> {
        self.count(token, "edges", snapshot_id)
    }

    fn count(&self, token: &CancelToken, table: &str, snapshot_id: &str) -> AgResult<usize> {
        token.check()?;
        let conn = self.conn.lock();
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE snapshot_id = ?1");
        conn.query_row(&sql, params![snapshot_id], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(AccessGraphError::storage)
    }

    /// PRINCIPAL nodes whose id or serialized labels contain `query`
    /// (case-sensitive), ordered by id. `limit == 0` means the default of 10.
    pub fn search_principals(
        &self,
        token: &CancelToken,
        snapshot_id: &str,
        query: &str,
        limit: usize,
    ) -> AgResult<Vec<Node>> {
        token.check()?;
        let limit = if limit == 0 { DEFAULT_SEARCH_LIMIT } else { limit };
        let conn = self.conn.lock();

        // instr() rather than LIKE: SQLite LIKE is ASCII case-insensitive,
        // and principal search is contractually case-sensitive.
        let mut stmt = conn
            .prepare(
                "SELECT id, kind, labels, props FROM nodes
                 WHERE snapshot_id = ?1 AND kind = 'PRINCIPAL'
                   AND (instr(id, ?2) > 0 OR instr(labels, ?2) > 0)
                 ORDER BY id
                 LIMIT ?3",
            )
            .map_err(AccessGraphError::storage)?;
        let mut rows = stmt
            .query(params![snapshot_id, query, limit as i64])
            .map_err(AccessGraphError::storage)?;

        let mut nodes = Vec::new();
        while let Some(row) = rows.next().map_err(AccessGraphError::storage)? {
            token.check()?;
            nodes.push(decode_node(row)?);
        }
        Ok(nodes)
    }

    /// Single-node lookup within a snapshot.
    pub fn get_node(
        &self,
        token: &CancelToken,
        snapshot_id: &str,
        node_id: &str,
    ) -> AgResult<Node> {
        token.check()?;
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, kind, labels, props FROM nodes
                 WHERE snapshot_id = ?1 AND id = ?2",
            )
            .map_err(AccessGraphError::storage)?;
        let mut rows = stmt
            .query(params![snapshot_id, node_id])
            .map_err(AccessGraphError::storage)?;
        match rows.next().map_err(AccessGraphError::storage)? {
            Some(row) => decode_node(row),
            None => Err(AccessGraphError::NotFound(format!(
                "node not found: {node_id}"
            ))),
        }
    }

    /// All edges of a snapshot in `(src, dst, kind)` order, for diffing.
    pub fn get_edges(&self, token: &CancelToken, snapshot_id: &str) -> AgResult<Vec<Edge>> {
        token.check()?;
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT src, dst, kind, props FROM edges
                 WHERE snapshot_id = ?1 ORDER BY src, dst, kind",
            )
            .map_err(AccessGraphError::storage)?;
        let mut rows = stmt
            .query(params![snapshot_id])
            .map_err(AccessGraphError::storage)?;

        let mut edges = Vec::new();
        while let Some(row) = rows.next().map_err(AccessGraphError::storage)? {
            token.check()?;
            edges.push(decode_edge(row)?);
        }
        Ok(edges)
    }
}

// ── Row decoding ─────────────────────────────────────────────────────────────

fn decode_node(row: &rusqlite::Row<'_>) -> AgResult<Node> {
    let id: String = row.get(0).map_err(AccessGraphError::storage)?;
    let kind: String = row.get(1).map_err(AccessGraphError::storage)?;
    let labels_json: String = row.get(2).map_err(AccessGraphError::storage)?;
    let props_json: String = row.get(3).map_err(AccessGraphError::storage)?;

    let kind: NodeKind = kind.parse()?;
    let labels: Vec<String> = serde_json::from_str(&labels_json)
        .map_err(|e| AccessGraphError::Storage(format!("decoding labels for node {id}: {e}")))?;
    let props: BTreeMap<String, String> = serde_json::from_str(&props_json)
        .map_err(|e| AccessGraphError::Storage(format!("decoding props for node {id}: {e}")))?;

    Ok(Node {
        id,
        kind,
        labels,
        props,
    })
}

fn decode_edge(row: &rusqlite::Row<'_>) -> AgResult<Edge> {
    let src: String = row.get(0).map_err(AccessGraphError::storage)?;
    let dst: String = row.get(1).map_err(AccessGraphError::storage)?;
    let kind: String = row.get(2).map_err(AccessGraphError::storage)?;
    let props_json: String = row.get(3).map_err(AccessGraphError::storage)?;

    let props: BTreeMap<String, String> = serde_json::from_str(&props_json).map_err(|e| {
        AccessGraphError::Storage(format!("decoding props for edge {src} -> {dst}: {e}"))
    })?;

    Ok(Edge {
        src,
        dst,
        kind,
        props,
    })
}
