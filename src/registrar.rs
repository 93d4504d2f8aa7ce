//! Tool Registrar (spec component #11): tool metadata plus dispatch from a
//! tool name + JSON arguments to the handler function that owns it. The RPC
//! transport (`crate::routes`) is a thin shell over this — it does not know
//! tool names itself, only how to get a `(name, Value)` pair to
//! `dispatch`.

use serde_json::Value;

use crate::runtime::Runtime;

/// Static metadata for one tool, surfaced by nothing in this crate yet but
/// kept alongside the dispatch table since a transport that lists available
/// tools (as the hosted RPC framework does) needs it and spec §1 only
/// excludes the *hosted* framework, not this seam.
#[derive(Debug, Clone, Copy)]
pub struct ToolMeta {
    pub name: &'static str,
    pub description: &'static str,
}

pub const TOOLS: &[ToolMeta] = &[
    ToolMeta { name: "herd_send", description: "Send a directed or broadcast message on the bus" },
    ToolMeta { name: "herd_checkin", description: "Heartbeat, drain mail, and fetch a peer-activity context pane" },
    ToolMeta { name: "herd_get_messages", description: "Drain mail without a heartbeat or context pane" },
    ToolMeta { name: "herd_spawn", description: "Bring up a new agent instance, optionally bound to a ticket" },
    ToolMeta { name: "herd_assign", description: "Link a ticket to an already-running agent instance" },
    ToolMeta { name: "herd_transition", description: "Move a ticket to a new status" },
    ToolMeta { name: "herd_review", description: "Record a PR review and its findings" },
    ToolMeta { name: "herd_metrics", description: "Run a named analytics query over the operational store" },
    ToolMeta { name: "herd_catchup", description: "Summarize activity since the caller's last session" },
    ToolMeta { name: "herd_record_decision", description: "Persist a decision record and notify the decisions channel" },
    ToolMeta { name: "herd_assume", description: "Compose the identity prompt for a named agent role" },
    ToolMeta { name: "herd_recall", description: "Semantic search over cross-session memory" },
    ToolMeta { name: "herd_remember", description: "Store a cross-session memory" },
    ToolMeta { name: "herd_graph", description: "Merge a node, create an edge, or query the structural graph" },
    ToolMeta { name: "herd_decommission", description: "Stop every running instance of an agent" },
    ToolMeta { name: "herd_standdown", description: "Stop every running instance of an agent (standdown variant)" },
    ToolMeta { name: "herd_harvest_tokens", description: "Aggregate session-transcript token usage into Token events" },
    ToolMeta { name: "herd_create_ticket", description: "Create a ticket and mirror it into the store and graph" },
];

/// A tool name with no entry in `TOOLS` is a `Fatal` error per spec §7 (bad
/// dispatch) — the caller gets `None` back and the transport turns that into
/// a 500, rather than a `{"success": false}` payload.
pub async fn dispatch(rt: &Runtime, name: &str, args: Value) -> Option<Value> {
    let parsed = |args: Value| serde_json::from_value(args);
    let bad_input = |e: serde_json::Error| serde_json::json!({"success": false, "error": format!("invalid arguments: {e}")});

    Some(match name {
        "herd_send" => match parsed(args) {
            Ok(req) => crate::tools::send::execute(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_checkin" => match parsed(args) {
            Ok(req) => crate::tools::checkin::execute(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_get_messages" => match parsed(args) {
            Ok(req) => crate::tools::get_messages::execute(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_spawn" => match parsed(args) {
            Ok(req) => crate::tools::spawn::execute(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_assign" => match parsed(args) {
            Ok(req) => crate::tools::assign::execute(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_transition" => match parsed(args) {
            Ok(req) => crate::tools::transition::execute(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_review" => match parsed(args) {
            Ok(req) => crate::tools::review::execute(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_metrics" => match parsed(args) {
            Ok(req) => crate::tools::metrics::execute(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_catchup" => match parsed(args) {
            Ok(req) => crate::tools::catchup::execute(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_record_decision" => match parsed(args) {
            Ok(req) => crate::tools::record_decision::execute(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_assume" => match parsed(args) {
            Ok(req) => crate::tools::assume::execute(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_recall" => match parsed(args) {
            Ok(req) => crate::tools::recall::recall(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_remember" => match parsed(args) {
            Ok(req) => crate::tools::recall::remember(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_graph" => match parsed(args) {
            Ok(req) => crate::tools::graph_query::execute(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_decommission" => match parsed(args) {
            Ok(req) => crate::tools::lifecycle::decommission(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_standdown" => match parsed(args) {
            Ok(req) => crate::tools::lifecycle::standdown(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_harvest_tokens" => match parsed(args) {
            Ok(req) => crate::tools::harvest::execute(rt, req).await,
            Err(e) => bad_input(e),
        },
        "herd_create_ticket" => match parsed(args) {
            Ok(req) => crate::tools::create_ticket::execute(rt, req).await,
            Err(e) => bad_input(e),
        },
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use serde_json::json;

    fn test_runtime() -> (Runtime, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RuntimeConfig::default();
        config.project_path = dir.path().to_path_buf();
        config.db_path = dir.path().join("herd.db");
        config.memory_path = dir.path().join("memory.db");
        config.graph_path = dir.path().join("graph.db");
        config.bus_path = dir.path().join("messages");
        (Runtime::new(config, "prompt".to_string()), dir)
    }

    #[tokio::test]
    async fn unknown_tool_name_dispatches_to_none() {
        let (rt, _d) = test_runtime();
        assert!(dispatch(&rt, "herd_nonexistent", json!({})).await.is_none());
    }

    #[tokio::test]
    async fn known_tool_with_malformed_args_returns_invalid_input_not_panic() {
        let (rt, _d) = test_runtime();
        let result = dispatch(&rt, "herd_send", json!({"to": 123})).await.unwrap();
        assert_eq!(result["success"], false);
    }

    #[tokio::test]
    async fn known_tool_with_valid_args_dispatches() {
        let (rt, _d) = test_runtime();
        let result = dispatch(&rt, "herd_send", json!({"to": "mason", "message": "hi"})).await.unwrap();
        assert_eq!(result["delivered"], true);
    }

    #[test]
    fn every_tool_has_nonempty_metadata() {
        assert_eq!(TOOLS.len(), 18);
        for tool in TOOLS {
            assert!(!tool.name.is_empty());
            assert!(!tool.description.is_empty());
        }
    }
}
