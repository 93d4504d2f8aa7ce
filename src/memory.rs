//! Semantic memory: vector-embedded cross-session notes (spec §3.5/§4.6).
//!
//! The original opens a LanceDB table; that product is explicitly out of
//! scope here (spec §1 excludes "the embedded store products themselves"), so
//! this module keeps the same external shape — fixed 384-dim vectors,
//! metadata filters, nearest-neighbor recall — over a `rusqlite` table, with
//! embedding and distance computed in-process. The embedding is a
//! deterministic hashed bag-of-words projection, not a trained model; it is
//! good enough to make semantically-similar text cluster for recall without
//! pulling in an ML runtime this crate has no other use for.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const VECTOR_DIM: usize = 384;

pub const MEMORY_TYPES: [&str; 7] =
    ["session_summary", "decision_context", "pattern", "preference", "thread", "lesson", "observation"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub project: String,
    pub repo: Option<String>,
    pub org: Option<String>,
    pub team: Option<String>,
    pub host: Option<String>,
    pub session_id: String,
    pub agent: String,
    pub memory_type: String,
    pub content: String,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecallHit {
    #[serde(flatten)]
    pub record: MemoryRecord,
    pub distance: f64,
}

#[derive(Debug, Default, Clone)]
pub struct RecallFilters {
    pub project: Option<String>,
    pub agent: Option<String>,
    pub memory_type: Option<String>,
    pub repo: Option<String>,
    pub session_id: Option<String>,
    pub org: Option<String>,
    pub team: Option<String>,
    pub host: Option<String>,
}

/// Projects text onto a fixed-length unit vector. Each dimension accumulates
/// a signed contribution from every token whose hash lands on it, so related
/// text (shared vocabulary) ends up with smaller cosine distance than
/// unrelated text, without needing a trained embedding model.
pub fn embed(text: &str) -> [f32; VECTOR_DIM] {
    let mut v = [0f32; VECTOR_DIM];
    for token in text.split_whitespace() {
        let token = token.to_lowercase();
        let h = fnv1a(token.as_bytes());
        let idx = (h % VECTOR_DIM as u64) as usize;
        let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        v[idx] += sign;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    (1.0 - (dot / (na * nb))) as f64
}

fn vector_to_blob(v: &[f32; VECTOR_DIM]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_vector(bytes: &[u8]) -> [f32; VECTOR_DIM] {
    let mut v = [0f32; VECTOR_DIM];
    for (i, chunk) in bytes.chunks_exact(4).take(VECTOR_DIM).enumerate() {
        v[i] = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    v
}

pub struct SemanticMemory {
    conn: Mutex<Connection>,
}

impl SemanticMemory {
    pub fn new(path: &str) -> Result<Self, String> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let conn = Connection::open(path).map_err(|e| e.to_string())?;
        let store = SemanticMemory { conn: Mutex::new(conn) };
        store.ensure_schema()?;
        println!("🧠 semantic memory opened at {path}");
        Ok(store)
    }

    /// Creates the table if absent; if it exists but predates the `summary`
    /// column, drops and recreates it (one-shot schema bump, spec §4.6).
    fn ensure_schema(&self) -> Result<(), String> {
        let conn = self.conn.lock().unwrap();
        let has_table: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='memories'",
                [],
                |r| r.get::<_, i64>(0),
            )
            .unwrap_or(0)
            > 0;

        if has_table {
            let has_summary: bool = conn
                .prepare("PRAGMA table_info(memories)")
                .and_then(|mut stmt| {
                    let cols: Vec<String> =
                        stmt.query_map([], |r| r.get::<_, String>(1))?.filter_map(|r| r.ok()).collect();
                    Ok(cols.contains(&"summary".to_string()))
                })
                .unwrap_or(false);
            if !has_summary {
                conn.execute_batch("DROP TABLE memories;").map_err(|e| e.to_string())?;
            }
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memories (
                id TEXT PRIMARY KEY,
                project TEXT NOT NULL,
                repo TEXT,
                org TEXT,
                team TEXT,
                host TEXT,
                session_id TEXT NOT NULL,
                agent TEXT NOT NULL,
                memory_type TEXT NOT NULL,
                content TEXT NOT NULL,
                summary TEXT,
                vector BLOB NOT NULL,
                created_at TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}'
            );
            CREATE INDEX IF NOT EXISTS idx_memories_project ON memories(project);
            CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(memory_type);",
        )
        .map_err(|e| e.to_string())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &self,
        project: &str,
        agent: &str,
        memory_type: &str,
        content: &str,
        session_id: &str,
        summary: Option<&str>,
        repo: Option<&str>,
        org: Option<&str>,
        team: Option<&str>,
        host: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<String, String> {
        if !MEMORY_TYPES.contains(&memory_type) {
            return Err(format!("Unknown memory_type: {memory_type}"));
        }
        let vector = embed(summary.unwrap_or(content));
        let id = uuid::Uuid::new_v4().to_string();
        let metadata = metadata.unwrap_or_else(|| Value::Object(Default::default()));

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO memories (id, project, repo, org, team, host, session_id, agent, memory_type,
                content, summary, vector, created_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                id, project, repo, org, team, host, session_id, agent, memory_type, content, summary,
                vector_to_blob(&vector), Utc::now().to_rfc3339(), metadata.to_string()
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(id)
    }

    pub fn recall(&self, query: &str, limit: usize, filters: &RecallFilters) -> Result<Vec<RecallHit>, String> {
        let query_vector = embed(query);

        let mut sql = "SELECT id, project, repo, org, team, host, session_id, agent, memory_type, content,
                summary, vector, created_at, metadata
             FROM memories WHERE 1=1"
            .to_string();
        let mut binds: Vec<String> = Vec::new();
        let mut push = |col: &str, val: &Option<String>, sql: &mut String, binds: &mut Vec<String>| {
            if let Some(v) = val {
                binds.push(v.clone());
                sql.push_str(&format!(" AND {col} = ?{}", binds.len()));
            }
        };
        push("project", &filters.project, &mut sql, &mut binds);
        push("agent", &filters.agent, &mut sql, &mut binds);
        push("memory_type", &filters.memory_type, &mut sql, &mut binds);
        push("repo", &filters.repo, &mut sql, &mut binds);
        push("session_id", &filters.session_id, &mut sql, &mut binds);
        push("org", &filters.org, &mut sql, &mut binds);
        push("team", &filters.team, &mut sql, &mut binds);
        push("host", &filters.host, &mut sql, &mut binds);

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql).map_err(|e| e.to_string())?;
        let bind_refs: Vec<&dyn rusqlite::ToSql> = binds.iter().map(|b| b as &dyn rusqlite::ToSql).collect();

        let mut hits: Vec<RecallHit> = stmt
            .query_map(bind_refs.as_slice(), |row| {
                let vector_blob: Vec<u8> = row.get(11)?;
                let metadata_raw: String = row.get(13)?;
                Ok((
                    MemoryRecord {
                        id: row.get(0)?,
                        project: row.get(1)?,
                        repo: row.get(2)?,
                        org: row.get(3)?,
                        team: row.get(4)?,
                        host: row.get(5)?,
                        session_id: row.get(6)?,
                        agent: row.get(7)?,
                        memory_type: row.get(8)?,
                        content: row.get(9)?,
                        summary: row.get(10)?,
                        created_at: row
                            .get::<_, String>(12)?
                            .parse::<DateTime<Utc>>()
                            .unwrap_or_else(|_| Utc::now()),
                        metadata: serde_json::from_str(&metadata_raw).unwrap_or(Value::Null),
                    },
                    blob_to_vector(&vector_blob),
                ))
            })
            .map_err(|e| e.to_string())?
            .filter_map(|r| r.ok())
            .map(|(record, vector)| RecallHit { distance: cosine_distance(&query_vector, &vector), record })
            .collect();

        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Scans `decision_context` memories for `metadata.hdr_number` values
    /// matching `HDR-\d{4}` and returns one past the maximum, or `HDR-0001`.
    pub fn next_hdr_number(&self) -> Result<String, String> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT metadata FROM memories WHERE memory_type = 'decision_context'")
            .map_err(|e| e.to_string())?;
        let rows: Vec<String> = stmt
            .query_map([], |r| r.get::<_, String>(0))
            .map_err(|e| e.to_string())?
            .filter_map(|r| r.ok())
            .collect();

        let mut max_n = 0u32;
        for raw in rows {
            let Ok(meta) = serde_json::from_str::<Value>(&raw) else { continue };
            let Some(hdr) = meta.get("hdr_number").and_then(|v| v.as_str()) else { continue };
            if let Some(digits) = hdr.strip_prefix("HDR-")
                && digits.len() == 4
                && let Ok(n) = digits.parse::<u32>()
            {
                max_n = max_n.max(n);
            }
        }
        Ok(format!("HDR-{:04}", max_n + 1))
    }

    pub fn is_available(&self) -> bool {
        self.conn.lock().map(|c| c.is_autocommit()).unwrap_or(false)
    }

    pub fn storage_info(&self, path: &str) -> HashMap<String, Value> {
        let meta = std::fs::metadata(path).ok();
        let mut info = HashMap::new();
        info.insert("path".to_string(), Value::String(path.to_string()));
        info.insert("size_bytes".to_string(), Value::from(meta.as_ref().map(|m| m.len()).unwrap_or(0)));
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> (SemanticMemory, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let m = SemanticMemory::new(dir.path().join("memory.db").to_str().unwrap()).unwrap();
        (m, dir)
    }

    #[test]
    fn rejects_unknown_memory_type() {
        let (m, _d) = memory();
        let err = m.store("herd", "mason", "bogus", "hello", "sess-1", None, None, None, None, None, None);
        assert!(err.is_err());
    }

    #[test]
    fn store_then_recall_finds_similar_text() {
        let (m, _d) = memory();
        m.store(
            "herd", "mason", "lesson", "always run migrations before tests", "sess-1",
            None, None, None, None, None, None,
        )
        .unwrap();
        m.store("herd", "mason", "lesson", "the sky is blue today", "sess-1", None, None, None, None, None, None)
            .unwrap();

        let hits = m.recall("run database migrations", 5, &RecallFilters::default()).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].record.content.contains("migrations"));
    }

    #[test]
    fn recall_respects_project_filter() {
        let (m, _d) = memory();
        m.store("herd", "mason", "observation", "note a", "sess-1", None, None, None, None, None, None).unwrap();
        m.store("other", "mason", "observation", "note b", "sess-1", None, None, None, None, None, None).unwrap();

        let filters = RecallFilters { project: Some("herd".to_string()), ..Default::default() };
        let hits = m.recall("note", 10, &filters).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.project, "herd");
    }

    #[test]
    fn hdr_counter_starts_at_one_and_increments() {
        let (m, _d) = memory();
        assert_eq!(m.next_hdr_number().unwrap(), "HDR-0001");

        m.store(
            "herd", "steve", "decision_context", "decided to use sqlite", "sess-1", None, None, None, None, None,
            Some(serde_json::json!({"hdr_number": "HDR-0003"})),
        )
        .unwrap();
        assert_eq!(m.next_hdr_number().unwrap(), "HDR-0004");
    }

    #[test]
    fn malformed_hdr_values_are_ignored() {
        let (m, _d) = memory();
        m.store(
            "herd", "steve", "decision_context", "x", "sess-1", None, None, None, None, None,
            Some(serde_json::json!({"hdr_number": "not-an-hdr"})),
        )
        .unwrap();
        assert_eq!(m.next_hdr_number().unwrap(), "HDR-0001");
    }
}
