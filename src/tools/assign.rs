//! `herd_assign` (spec §4.8): links a ticket to an agent without spawning —
//! the coordinator's "hand this to someone already running" path, as
//! distinct from `herd_spawn`'s "bring someone new up" path. Grounded on
//! `herd_mcp/tools/assign.py`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::entities::TicketEvent;
use crate::runtime::Runtime;
use crate::tools::support::looks_like_tracker_id;
use crate::tools::{ensure_ticket, resolve_caller};

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub ticket_id: String,
    pub agent_name: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    pub caller: Option<String>,
}

fn default_priority() -> String {
    "normal".to_string()
}

pub async fn execute(rt: &Runtime, req: AssignRequest) -> Value {
    if req.agent_name.trim().is_empty() {
        return json!({"assigned": false, "error": "agent_name is required", "ticket": req.ticket_id, "priority": req.priority});
    }

    let Some(ticket) = ensure_ticket(rt, &req.ticket_id).await else {
        return json!({"assigned": false, "error": format!("ticket not found: {}", req.ticket_id), "priority": req.priority});
    };

    let _caller = resolve_caller(rt, req.caller.as_deref());

    let agent_instance_code = rt.store.latest_instance(&req.agent_name).map(|i| i.agent_instance_code);
    let note = if agent_instance_code.is_none() { Some("No active agent instance found".to_string()) } else { None };

    let previous_status = ticket.ticket_current_status.clone();

    let _guard = rt.adapters.write_lock.lock().await;
    rt.store.append_ticket_event(&TicketEvent::new(
        agent_instance_code.clone().unwrap_or_default(),
        req.ticket_id.clone(),
        "assigned",
        note.clone(),
    ));
    rt.store.set_ticket_status(&req.ticket_id, "assigned");
    drop(_guard);

    let mut linear_synced = false;
    let mut linear_sync_error = None;
    if looks_like_tracker_id(&req.ticket_id)
        && let Some(tickets) = &rt.adapters.tickets
    {
        match tickets.update(&req.ticket_id, &json!({"status": "assigned", "assignee": req.agent_name})).await {
            Ok(()) => linear_synced = true,
            Err(e) => linear_sync_error = Some(e),
        }
    }

    let mut result = json!({
        "assigned": true,
        "agent": req.agent_name,
        "ticket": {
            "id": req.ticket_id,
            "title": ticket.ticket_title,
            "description": ticket.ticket_description,
            "previous_status": previous_status,
        },
        "priority": req.priority,
        "agent_instance_code": agent_instance_code,
        "note": note,
        "linear_synced": linear_synced,
    });
    if let Some(err) = linear_sync_error {
        result["linear_sync_error"] = json!(err);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::entities::TicketRecord;

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
    async fn requires_agent_name() {
        let (rt, _d) = test_runtime();
        let result = execute(
            &rt,
            AssignRequest { ticket_id: "DBC-1".to_string(), agent_name: "".to_string(), priority: "normal".to_string(), caller: None },
        )
        .await;
        assert_eq!(result["assigned"], false);
    }

    #[tokio::test]
    async fn assigns_with_no_active_instance_note() {
        let (rt, _d) = test_runtime();
        rt.store.save_ticket(&TicketRecord::new("DBC-1".to_string(), "fix thing".to_string(), None, None));

        let result = execute(
            &rt,
            AssignRequest { ticket_id: "DBC-1".to_string(), agent_name: "mason".to_string(), priority: "high".to_string(), caller: None },
        )
        .await;
        assert_eq!(result["assigned"], true);
        assert_eq!(result["note"], "No active agent instance found");
        assert_eq!(rt.store.get_ticket("DBC-1").unwrap().ticket_current_status, "assigned");
    }

    #[tokio::test]
    async fn missing_ticket_without_tracker_shape_fails() {
        let (rt, _d) = test_runtime();
        let result = execute(
            &rt,
            AssignRequest { ticket_id: "nope".to_string(), agent_name: "mason".to_string(), priority: "normal".to_string(), caller: None },
        )
        .await;
        assert_eq!(result["assigned"], false);
    }
}
