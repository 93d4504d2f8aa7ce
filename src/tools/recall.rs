//! `herd_recall` / `herd_remember` (spec §4.8): thin wrappers over
//! `SemanticMemory`. Both report `{"success": false, "error": ...}` when the
//! vector store failed to open rather than panicking — the same
//! not-configured shape every other adapter-backed tool uses. Grounded on
//! `herd_mcp/tools/recall.py` and `herd_mcp/tools/remember.py`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::memory::RecallFilters;
use crate::runtime::Runtime;
use crate::tools::resolve_caller;

#[derive(Debug, Deserialize)]
pub struct RememberRequest {
    pub memory_type: String,
    pub content: String,
    pub summary: Option<String>,
    pub session_id: Option<String>,
    pub repo: Option<String>,
    pub metadata: Option<Value>,
    pub caller: Option<String>,
}

pub async fn remember(rt: &Runtime, req: RememberRequest) -> Value {
    let Some(memory) = &rt.memory else {
        return json!({"success": false, "error": "semantic memory not configured"});
    };
    let identity = resolve_caller(rt, req.caller.as_deref());
    let project = rt.config.project_path.to_string_lossy().to_string();
    let session_id = req.session_id.unwrap_or_else(|| "unknown-session".to_string());

    match memory.store(
        &project,
        &identity.agent,
        &req.memory_type,
        &req.content,
        &session_id,
        req.summary.as_deref(),
        req.repo.as_deref(),
        rt.config.org.as_deref(),
        identity.team.as_deref(),
        rt.config.host.as_deref(),
        req.metadata,
    ) {
        Ok(id) => json!({"success": true, "memory_id": id}),
        Err(e) => json!({"success": false, "error": e}),
    }
}

#[derive(Debug, Deserialize)]
pub struct RecallRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub memory_type: Option<String>,
    pub agent: Option<String>,
    pub repo: Option<String>,
    pub session_id: Option<String>,
    pub caller: Option<String>,
}

fn default_limit() -> usize {
    10
}

pub async fn recall(rt: &Runtime, req: RecallRequest) -> Value {
    let Some(memory) = &rt.memory else {
        return json!({"success": false, "error": "semantic memory not configured"});
    };
    let _identity = resolve_caller(rt, req.caller.as_deref());
    let project = rt.config.project_path.to_string_lossy().to_string();

    let filters = RecallFilters {
        project: Some(project),
        agent: req.agent,
        memory_type: req.memory_type,
        repo: req.repo,
        session_id: req.session_id,
        org: rt.config.org.clone(),
        team: rt.config.team.clone(),
        host: rt.config.host.clone(),
    };

    match memory.recall(&req.query, req.limit, &filters) {
        Ok(hits) => json!({"success": true, "results": hits}),
        Err(e) => json!({"success": false, "error": e}),
    }
}
