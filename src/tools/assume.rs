//! `herd_assume` (spec §4.8): composes the identity prompt a subprocess boots
//! with when it "becomes" a named agent outside of `herd_spawn` (e.g. a chat
//! session resuming a role). Grounded on `herd_mcp/tools/assume_role.py`.

use std::collections::HashSet;
use std::sync::LazyLock;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::runtime::Runtime;
use crate::tiers::resolve_legacy;
use crate::tools::support::{extract_craft_section, find_repo_root, herd_content_path, read_file_safe, recent_git_log_text};

/// The curated current-agent roster `herd_assume` accepts — tier membership
/// (spec §3.7) is open-ended for the execution tier, so this check uses its
/// own fixed list rather than `tiers::known_agents()`.
pub const KNOWN_AGENTS: [&str; 8] =
    ["mason", "fresco", "scribe", "wardenstein", "steve", "leonardo", "vigil", "rook"];

static KNOWN_AGENT_SET: LazyLock<HashSet<&'static str>> = LazyLock::new(|| KNOWN_AGENTS.into_iter().collect());

#[derive(Debug, Deserialize)]
pub struct AssumeRequest {
    pub agent_name: String,
}

pub async fn execute(rt: &Runtime, req: AssumeRequest) -> Value {
    let agent_code = resolve_legacy(&req.agent_name);

    if !KNOWN_AGENT_SET.contains(agent_code.as_str()) {
        return json!({
            "success": false,
            "error": format!("unknown agent '{}'", req.agent_name),
            "valid_agents": KNOWN_AGENTS,
        });
    }

    let repo_root = find_repo_root(&rt.config.project_path);

    let role_doc = herd_content_path(&repo_root, &format!("roles/{agent_code}.md"))
        .and_then(|p| read_file_safe(&p))
        .unwrap_or_else(|| format!("(no role definition found for {agent_code})"));

    let craft_section = herd_content_path(&repo_root, "craft.md")
        .and_then(|p| read_file_safe(&p))
        .map(|content| extract_craft_section(&content, &agent_code))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "(no craft standards found)".to_string());

    let guidelines = herd_content_path(&repo_root, "guidelines.md")
        .and_then(|p| read_file_safe(&p))
        .unwrap_or_else(|| "(no project guidelines found)".to_string());

    let status_doc = herd_content_path(&repo_root, "STATUS.md")
        .and_then(|p| read_file_safe(&p))
        .unwrap_or_else(|| "(no STATUS.md found)".to_string());

    let commits = recent_git_log_text(&repo_root, 10);

    let since = chrono::Utc::now() - chrono::Duration::days(7);
    let tracker_tickets: Vec<Value> = match &rt.adapters.tickets {
        Some(tickets) => tickets.list(&json!({"assignee": agent_code})).await.unwrap_or_default(),
        None => Vec::new(),
    };
    let handoffs: Vec<String> =
        crate::tools::support::get_handoffs(&repo_root, since).into_iter().map(|h| h.filename).collect();
    let decisions_count = rt
        .store
        .recent_decisions(since)
        .into_iter()
        .filter(|d| d.decided_by == agent_code)
        .count();

    let prompt = format!(
        "{role_doc}\n\n{craft_section}\n\n{guidelines}\n\n\
         ## Current status\n{status_doc}\n\n\
         ## Recent commits\n{commits}\n\n\
         ## Assigned tickets\n{} open\n\n\
         ## Pending handoffs\n{} pending\n\n\
         ## Recent decisions by you\n{decisions_count} in the last 7 days\n\n\
         You are {agent_code}. Begin each session by calling herd_checkin.",
        tracker_tickets.len(),
        handoffs.len(),
    );

    json!({
        "success": true,
        "agent": agent_code,
        "prompt": prompt,
        "tracker_tickets": tracker_tickets,
        "pending_handoffs": handoffs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

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
    async fn unknown_agent_lists_valid_names() {
        let (rt, _d) = test_runtime();
        let result = execute(&rt, AssumeRequest { agent_name: "nobody".into() }).await;
        assert_eq!(result["success"], false);
        assert!(result["valid_agents"].as_array().unwrap().contains(&json!("mason")));
    }

    #[tokio::test]
    async fn legacy_alias_resolves_to_current_code() {
        let (rt, _d) = test_runtime();
        let result = execute(&rt, AssumeRequest { agent_name: "grunt".into() }).await;
        assert_eq!(result["success"], true);
        assert_eq!(result["agent"], "mason");
    }

    #[tokio::test]
    async fn known_agent_without_repo_content_still_succeeds() {
        let (rt, _d) = test_runtime();
        let result = execute(&rt, AssumeRequest { agent_name: "steve".into() }).await;
        assert_eq!(result["success"], true);
        assert!(result["prompt"].as_str().unwrap().contains("no role definition found"));
    }
}
