//! `herd_spawn` (spec §4.8): brings a new agent instance up, either bound to
//! a ticket (creates a worktree, transitions the ticket, assembles the
//! context payload the subprocess boots with) or as a bare-roster
//! pre-allocation. Grounded on `herd_mcp/tools/spawn.py`.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::entities::{AgentInstanceRecord, LifecycleEvent, TicketEvent};
use crate::runtime::Runtime;
use crate::tools::support::{
    extract_craft_section, find_repo_root, herd_content_path, read_file_safe,
};
use crate::tools::{ensure_ticket, resolve_caller};

/// Role name → agent code. Bare agent codes are also accepted directly.
static ROLE_TO_AGENT: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("coordinator", "steve"),
        ("backend builder", "mason"),
        ("backend", "mason"),
        ("frontend builder", "fresco"),
        ("frontend", "fresco"),
        ("reviewer", "wardenstein"),
        ("documenter", "scribe"),
        ("mechanical worker", "rook"),
        ("mechanical", "rook"),
        ("automated qa", "vigil"),
    ])
});

fn resolve_agent_code(role: &str) -> String {
    ROLE_TO_AGENT.get(role).map(|s| s.to_string()).unwrap_or_else(|| role.to_string())
}

#[derive(Debug, Deserialize)]
pub struct SpawnRequest {
    #[serde(default = "default_count")]
    pub count: u32,
    pub role: String,
    pub model: Option<String>,
    pub caller: Option<String>,
    pub ticket_id: Option<String>,
}

fn default_count() -> u32 {
    1
}

pub async fn execute(rt: &Runtime, req: SpawnRequest) -> Value {
    if req.role.trim().is_empty() {
        return json!({"success": false, "error": "role is required"});
    }
    let agent_code = resolve_agent_code(&req.role);
    let identity = resolve_caller(rt, req.caller.as_deref());
    let default_model = req.model.clone().unwrap_or_else(|| "claude-sonnet-4".to_string());

    match (&req.ticket_id, req.count) {
        (Some(ticket_id), 1) => ticket_bound_spawn(rt, &agent_code, ticket_id, &default_model, &identity.agent).await,
        (Some(_), _) => json!({"success": false, "error": "ticket-bound spawn requires count == 1"}),
        (None, count) => bare_roster_spawn(rt, &agent_code, count, &default_model).await,
    }
}

async fn ticket_bound_spawn(rt: &Runtime, agent_code: &str, ticket_id: &str, model: &str, requested_by: &str) -> Value {
    let Some(ticket) = ensure_ticket(rt, ticket_id).await else {
        return json!({"success": false, "error": format!("ticket not found: {ticket_id}")});
    };

    let ticket_slug = ticket_id.to_lowercase();
    let branch_name = format!("herd/{agent_code}/{ticket_slug}-herd-spawn");
    let worktree_path = format!("/private/tmp/{agent_code}-{ticket_slug}");

    let worktree_result = match &rt.adapters.repo {
        Some(repo) => match repo.create_branch(&branch_name, "main").await {
            Ok(_) => repo.create_worktree(&branch_name, &worktree_path).await,
            Err(e) => Err(e),
        },
        None => Err("RepoAdapter not configured".to_string()),
    };
    let worktree_path = worktree_result.as_ref().ok().cloned();

    let instance_id = uuid::Uuid::new_v4().to_string();
    let _guard = rt.adapters.write_lock.lock().await;
    rt.store.save_agent_instance(&AgentInstanceRecord {
        agent_instance_code: instance_id.clone(),
        agent_code: agent_code.to_string(),
        model_code: Some(model.to_string()),
        ticket_code: Some(ticket_id.to_string()),
        spawned_by_agent_instance_code: None,
        craft_version_code: None,
        personality_version_code: None,
        started_at: chrono::Utc::now(),
        ended_at: None,
    });
    rt.store.append_lifecycle_event(&LifecycleEvent {
        agent_instance_code: instance_id.clone(),
        lifecycle_event_type: "spawned".to_string(),
        lifecycle_detail: Some(format!("ticket={ticket_id}")),
        created_at: chrono::Utc::now(),
    });
    rt.store.append_ticket_event(&TicketEvent::new(
        instance_id.clone(),
        ticket_id.to_string(),
        "status_changed",
        Some(format!("assigned to new instance of {agent_code}")),
    ));
    rt.store.set_ticket_status(ticket_id, "in_progress");
    drop(_guard);

    let mut linear_synced = false;
    if crate::tools::support::looks_like_tracker_id(ticket_id)
        && let Some(tickets) = &rt.adapters.tickets
        && tickets.transition(ticket_id, "in_progress", None, None).await.is_ok()
    {
        linear_synced = true;
    }

    if let Some(graph) = &rt.graph {
        let _ = graph.merge_node("Agent", &json!({"id": instance_id, "agent_code": agent_code, "status": "running"}));
        let _ = graph.create_edge("AssignedTo", "Agent", &instance_id, "Ticket", ticket_id, None);
    }

    let context_payload = assemble_context_payload(rt, agent_code, &ticket, &worktree_path, &branch_name, requested_by);

    json!({
        "success": true,
        "agents": [instance_id],
        "agent": agent_code,
        "worktree_path": worktree_path,
        "branch_name": branch_name,
        "context_payload": context_payload,
        "linear_synced": linear_synced,
        "worktree_error": worktree_result.err(),
    })
}

async fn bare_roster_spawn(rt: &Runtime, agent_code: &str, count: u32, model: &str) -> Value {
    let mut instances = Vec::new();
    let _guard = rt.adapters.write_lock.lock().await;
    for _ in 0..count.max(1) {
        let instance_id = uuid::Uuid::new_v4().to_string();
        rt.store.save_agent_instance(&AgentInstanceRecord {
            agent_instance_code: instance_id.clone(),
            agent_code: agent_code.to_string(),
            model_code: Some(model.to_string()),
            ticket_code: None,
            spawned_by_agent_instance_code: None,
            craft_version_code: None,
            personality_version_code: None,
            started_at: chrono::Utc::now(),
            ended_at: None,
        });
        rt.store.append_lifecycle_event(&LifecycleEvent {
            agent_instance_code: instance_id.clone(),
            lifecycle_event_type: "spawned".to_string(),
            lifecycle_detail: None,
            created_at: chrono::Utc::now(),
        });
        instances.push(instance_id);
    }
    drop(_guard);

    json!({"success": true, "agents": instances, "agent": agent_code, "linear_synced": false})
}

/// Concatenates the role file, the agent's craft-standards slice, project
/// guidelines, ticket summary, a workdir/branch directive, and a git-safety
/// directive. Falls back to a placeholder wherever a `.herd/` content file is
/// missing rather than failing the spawn.
fn assemble_context_payload(
    rt: &Runtime,
    agent_code: &str,
    ticket: &crate::entities::TicketRecord,
    worktree_path: &Option<String>,
    branch_name: &str,
    requested_by: &str,
) -> String {
    let repo_root = find_repo_root(&rt.config.project_path);

    let role_doc = herd_content_path(&repo_root, &format!("roles/{agent_code}.md"))
        .and_then(|p| read_file_safe(&p))
        .unwrap_or_else(|| format!("(no role definition found for {agent_code})"));

    let craft_section = herd_content_path(&repo_root, "craft.md")
        .and_then(|p| read_file_safe(&p))
        .map(|content| extract_craft_section(&content, agent_code))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "(no craft standards found)".to_string());

    let guidelines = herd_content_path(&repo_root, "guidelines.md")
        .and_then(|p| read_file_safe(&p))
        .unwrap_or_else(|| "(no project guidelines found)".to_string());

    let worktree_line = match worktree_path {
        Some(path) => format!("Work in worktree {path} on branch {branch_name}."),
        None => format!("Work on branch {branch_name} (no worktree was created)."),
    };

    format!(
        "{role_doc}\n\n{craft_section}\n\n{guidelines}\n\n\
         Ticket {}: {}\n{}\n\n{worktree_line}\n\n\
         Never push to main. Never merge your own PR.\n\nRequested by: {requested_by}",
        ticket.ticket_code,
        ticket.ticket_title,
        ticket.ticket_description.as_deref().unwrap_or(""),
    )
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
    async fn rejects_empty_role() {
        let (rt, _d) = test_runtime();
        let result = execute(&rt, SpawnRequest { count: 1, role: " ".to_string(), model: None, caller: None, ticket_id: None }).await;
        assert_eq!(result["success"], false);
    }

    #[tokio::test]
    async fn bare_roster_spawn_creates_requested_count() {
        let (rt, _d) = test_runtime();
        let result =
            execute(&rt, SpawnRequest { count: 3, role: "mason".to_string(), model: None, caller: None, ticket_id: None }).await;
        assert_eq!(result["success"], true);
        assert_eq!(result["agents"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn role_name_resolves_to_agent_code() {
        let (rt, _d) = test_runtime();
        let result = execute(
            &rt,
            SpawnRequest { count: 1, role: "backend builder".to_string(), model: None, caller: None, ticket_id: None },
        )
        .await;
        assert_eq!(result["agent"], "mason");
    }

    #[tokio::test]
    async fn ticket_bound_spawn_twice_creates_independent_instances() {
        let (rt, _d) = test_runtime();
        rt.store.save_ticket(&crate::entities::TicketRecord::new("DBC-1".into(), "fix".into(), None, None));

        let first = execute(
            &rt,
            SpawnRequest { count: 1, role: "mason".to_string(), model: None, caller: Some("steve".into()), ticket_id: Some("DBC-1".into()) },
        )
        .await;
        let second = execute(
            &rt,
            SpawnRequest { count: 1, role: "mason".to_string(), model: None, caller: Some("steve".into()), ticket_id: Some("DBC-1".into()) },
        )
        .await;

        let first_id = first["agents"][0].as_str().unwrap();
        let second_id = second["agents"][0].as_str().unwrap();
        assert_ne!(first_id, second_id);
        assert_eq!(rt.store.get_ticket("DBC-1").unwrap().ticket_current_status, "in_progress");
    }

    #[tokio::test]
    async fn missing_ticket_fails() {
        let (rt, _d) = test_runtime();
        let result = execute(
            &rt,
            SpawnRequest { count: 1, role: "mason".to_string(), model: None, caller: None, ticket_id: Some("nope".into()) },
        )
        .await;
        assert_eq!(result["success"], false);
    }
}
