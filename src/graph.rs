//! Structural graph: a labeled property graph for relationship queries
//! (spec §3.6/§4.7). KuzuDB itself is out of scope (spec §1 excludes "the
//! embedded store products themselves"); this keeps the same external shape
//! — labeled nodes keyed by id, labeled edges with properties, idempotent
//! merge — as one property-graph-over-SQL table set: one table per node
//! label, one table per edge label, the way the original's `_NODE_TABLES`/
//! `_EDGE_TABLES` maps describe the same schema over its own backend.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::Value;

pub const NODE_LABELS: [&str; 7] = ["Decision", "Agent", "Ticket", "File", "Repository", "Session", "Concept"];

pub const EDGE_LABELS: [&str; 12] = [
    "Decides", "Implements", "Touches", "Reviews", "Supersedes", "DependsOn", "SpawnedBy", "AssignedTo",
    "BlockedBy", "CompletedBy", "BelongsTo", "TaggedWith",
];

pub struct StructuralGraph {
    conn: Mutex<Connection>,
}

impl StructuralGraph {
    pub fn new(path: &str) -> Result<Self, String> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let conn = Connection::open(path).map_err(|e| e.to_string())?;
        let graph = StructuralGraph { conn: Mutex::new(conn) };
        graph.ensure_schema()?;
        println!("🕸️  structural graph opened at {path}");
        Ok(graph)
    }

    fn ensure_schema(&self) -> Result<(), String> {
        let conn = self.conn.lock().unwrap();
        for label in NODE_LABELS {
            let table = node_table(label);
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    props TEXT NOT NULL DEFAULT '{{}}',
                    created_at TEXT NOT NULL
                );"
            ))
            .map_err(|e| e.to_string())?;
        }
        for label in EDGE_LABELS {
            let table = edge_table(label);
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    from_label TEXT NOT NULL,
                    from_id TEXT NOT NULL,
                    to_label TEXT NOT NULL,
                    to_id TEXT NOT NULL,
                    props TEXT NOT NULL DEFAULT '{{}}',
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (from_label, from_id, to_label, to_id)
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_from ON {table}(from_label, from_id);
                CREATE INDEX IF NOT EXISTS idx_{table}_to ON {table}(to_label, to_id);"
            ))
            .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    /// Inserts a node, or updates its non-key properties if one with this id
    /// already exists. `props` must contain `id`.
    pub fn merge_node(&self, label: &str, props: &Value) -> Result<(), String> {
        let Some(id) = props.get("id").and_then(|v| v.as_str()) else {
            return Err("merge_node requires an `id` property".to_string());
        };
        let table = node_table(label);
        let conn = self.conn.lock().unwrap();

        let existing: Option<String> =
            conn.query_row(&format!("SELECT props FROM {table} WHERE id = ?1"), [id], |r| r.get(0)).ok();

        let merged = match existing {
            Some(raw) => {
                let mut current: Value = serde_json::from_str(&raw).unwrap_or(Value::Object(Default::default()));
                if let (Some(current_obj), Some(new_obj)) = (current.as_object_mut(), props.as_object()) {
                    for (k, v) in new_obj {
                        if k != "id" {
                            current_obj.insert(k.clone(), v.clone());
                        }
                    }
                }
                current
            }
            None => props.clone(),
        };

        conn.execute(
            &format!(
                "INSERT INTO {table} (id, props, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET props = excluded.props"
            ),
            params![id, merged.to_string(), Utc::now().to_rfc3339()],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn get_node(&self, label: &str, id: &str) -> Option<Value> {
        let table = node_table(label);
        let conn = self.conn.lock().unwrap();
        conn.query_row(&format!("SELECT props FROM {table} WHERE id = ?1"), [id], |r| r.get::<_, String>(0))
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    /// Creates an edge between two already-merged nodes. Adds `created_at`
    /// to `props` if not already present.
    pub fn create_edge(
        &self,
        rel_type: &str,
        from_label: &str,
        from_id: &str,
        to_label: &str,
        to_id: &str,
        props: Option<Value>,
    ) -> Result<(), String> {
        let table = edge_table(rel_type);
        let mut props = props.unwrap_or_else(|| Value::Object(Default::default()));
        let created_at = Utc::now().to_rfc3339();
        if let Some(obj) = props.as_object_mut()
            && !obj.contains_key("created_at")
        {
            obj.insert("created_at".to_string(), Value::String(created_at.clone()));
        }

        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {table} (from_label, from_id, to_label, to_id, props, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(from_label, from_id, to_label, to_id) DO UPDATE SET props = excluded.props"
            ),
            params![from_label, from_id, to_label, to_id, props.to_string(), created_at],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// A scoped query surface rather than full Cypher (see DESIGN.md): named
    /// traversals a tool handler actually needs. `cypher` selects one of the
    /// handful of supported shapes; unrecognized shapes return an empty set
    /// rather than erroring, matching `is_available`'s graceful-degradation
    /// posture.
    pub fn query(&self, cypher: &str, params: &Value) -> Vec<HashMap<String, Value>> {
        match cypher {
            "neighbors_by_edge" => {
                let Some(rel_type) = params.get("rel_type").and_then(|v| v.as_str()) else { return Vec::new() };
                let Some(to_label) = params.get("to_label").and_then(|v| v.as_str()) else { return Vec::new() };
                let Some(to_id) = params.get("to_id").and_then(|v| v.as_str()) else { return Vec::new() };
                self.neighbors_by_edge(rel_type, to_label, to_id)
            }
            _ => Vec::new(),
        }
    }

    /// `from_id`s of every edge of `rel_type` pointing at `(to_label, to_id)`
    /// — the traversal `herd_checkin`'s context pane uses to restrict peers
    /// to those `AssignedTo` the caller's current ticket.
    fn neighbors_by_edge(&self, rel_type: &str, to_label: &str, to_id: &str) -> Vec<HashMap<String, Value>> {
        let table = edge_table(rel_type);
        let conn = self.conn.lock().unwrap();
        let Ok(mut stmt) = conn.prepare(&format!("SELECT from_id FROM {table} WHERE to_label = ?1 AND to_id = ?2")) else {
            return Vec::new();
        };
        stmt.query_map(params![to_label, to_id], |r| r.get::<_, String>(0))
            .map(|rows| {
                rows.filter_map(|r| r.ok())
                    .map(|id| HashMap::from([("from_id".to_string(), Value::String(id))]))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_available(&self) -> bool {
        self.conn.lock().map(|c| c.is_autocommit()).unwrap_or(false)
    }
}

fn node_table(label: &str) -> String {
    format!("node_{}", label.to_lowercase())
}

fn edge_table(label: &str) -> String {
    format!("edge_{}", label.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph() -> (StructuralGraph, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let g = StructuralGraph::new(dir.path().join("graph.db").to_str().unwrap()).unwrap();
        (g, dir)
    }

    #[test]
    fn merge_node_is_idempotent_and_overlays_properties() {
        let (g, _d) = graph();
        g.merge_node("Ticket", &json!({"id": "DBC-1", "title": "first"})).unwrap();
        g.merge_node("Ticket", &json!({"id": "DBC-1", "status": "open"})).unwrap();

        let node = g.get_node("Ticket", "DBC-1").unwrap();
        assert_eq!(node.get("title").unwrap(), "first");
        assert_eq!(node.get("status").unwrap(), "open");
    }

    #[test]
    fn merge_node_requires_id() {
        let (g, _d) = graph();
        assert!(g.merge_node("Ticket", &json!({"title": "no id"})).is_err());
    }

    #[test]
    fn create_edge_stamps_created_at_when_absent() {
        let (g, _d) = graph();
        g.merge_node("Agent", &json!({"id": "mason"})).unwrap();
        g.merge_node("Ticket", &json!({"id": "DBC-1"})).unwrap();
        g.create_edge("AssignedTo", "Agent", "mason", "Ticket", "DBC-1", None).unwrap();

        let hits = g.query("neighbors_by_edge", &json!({"rel_type": "AssignedTo", "to_label": "Ticket", "to_id": "DBC-1"}));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].get("from_id").unwrap(), "mason");
    }

    #[test]
    fn is_available_true_for_open_connection() {
        let (g, _d) = graph();
        assert!(g.is_available());
    }
}
