//! `herd_create_ticket` — supplemented tool (SPEC_FULL §11.2), not named in
//! the distilled tool list but present throughout the original as
//! `herd_mcp/tools/create_ticket.py`: every other tool assumes tickets
//! already exist, and nothing else in the distillation creates one.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::entities::{TicketEvent, TicketRecord};
use crate::runtime::Runtime;
use crate::tools::resolve_caller;

static PRIORITY_MAP: LazyLock<HashMap<&'static str, i64>> = LazyLock::new(|| {
    HashMap::from([("none", 0), ("urgent", 1), ("high", 2), ("normal", 3), ("low", 4)])
});

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub agent_name: Option<String>,
}

fn default_priority() -> String {
    "normal".to_string()
}

pub async fn execute(rt: &Runtime, req: CreateTicketRequest) -> Value {
    if req.title.trim().is_empty() {
        return json!({"created": false, "error": "title is required"});
    }

    let Some(priority_value) = PRIORITY_MAP.get(req.priority.as_str()) else {
        let mut valid: Vec<&&str> = PRIORITY_MAP.keys().collect();
        valid.sort();
        return json!({
            "created": false,
            "error": format!("Unknown priority '{}'. Valid values: {:?}", req.priority, valid),
        });
    };

    let Some(tickets) = &rt.adapters.tickets else {
        return json!({"created": false, "error": "TicketAdapter not configured"});
    };

    let identity = resolve_caller(rt, req.agent_name.as_deref());

    let _guard = rt.adapters.write_lock.lock().await;
    let ticket_id = match tickets.create(&req.title, req.description.as_deref(), *priority_value, &req.labels).await {
        Ok(id) => id,
        Err(e) => return json!({"created": false, "error": e}),
    };

    let mut ticket = TicketRecord::new(ticket_id.clone(), req.title.clone(), req.description.clone(), None);
    ticket.ticket_current_status = "backlog".to_string();
    rt.store.save_ticket(&ticket);
    rt.store.append_ticket_event(&TicketEvent::new(
        String::new(),
        ticket_id.clone(),
        "created",
        Some(format!("Created by {}", identity.agent)),
    ));
    drop(_guard);

    if let Some(graph) = &rt.graph {
        let _ = graph.merge_node(
            "Ticket",
            &json!({"id": ticket_id, "title": req.title, "status": "backlog", "priority": req.priority}),
        );
    }

    json!({
        "created": true,
        "ticket_id": ticket_id,
        "title": req.title,
        "description": req.description,
        "priority": req.priority,
        "labels": req.labels,
        "agent": identity.agent,
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
    async fn rejects_empty_title() {
        let (rt, _d) = test_runtime();
        let result = execute(
            &rt,
            CreateTicketRequest { title: "  ".to_string(), description: None, priority: "normal".to_string(), labels: vec![], agent_name: None },
        )
        .await;
        assert_eq!(result["created"], false);
    }

    #[tokio::test]
    async fn rejects_unknown_priority_without_touching_store() {
        let (rt, _d) = test_runtime();
        let result = execute(
            &rt,
            CreateTicketRequest {
                title: "fix thing".to_string(),
                description: None,
                priority: "critical".to_string(),
                labels: vec![],
                agent_name: None,
            },
        )
        .await;
        assert_eq!(result["created"], false);
        assert!(result["error"].as_str().unwrap().contains("Unknown priority"));
    }

    #[tokio::test]
    async fn without_tickets_adapter_returns_not_configured() {
        let (rt, _d) = test_runtime();
        let result = execute(
            &rt,
            CreateTicketRequest {
                title: "fix thing".to_string(),
                description: None,
                priority: "normal".to_string(),
                labels: vec![],
                agent_name: None,
            },
        )
        .await;
        assert_eq!(result["created"], false);
        assert_eq!(result["error"], "TicketAdapter not configured");
    }
}
