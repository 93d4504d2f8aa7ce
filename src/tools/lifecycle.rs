//! `herd_decommission` / `herd_standdown` (spec §4.8): stops every running
//! instance of a target agent. Both names map to the same operation; only
//! the lifecycle event type differs (`decommissioned` vs `standdown`).
//! Grounded on `herd_mcp/tools/decommission.py` / `standdown.py`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::entities::LifecycleEvent;
use crate::runtime::Runtime;
use crate::tools::resolve_caller;

#[derive(Debug, Deserialize)]
pub struct LifecycleRequest {
    pub agent_name: String,
    pub caller: Option<String>,
}

pub async fn decommission(rt: &Runtime, req: LifecycleRequest) -> Value {
    execute(rt, req, "decommissioned").await
}

pub async fn standdown(rt: &Runtime, req: LifecycleRequest) -> Value {
    execute(rt, req, "standdown").await
}

async fn execute(rt: &Runtime, req: LifecycleRequest, event_type: &str) -> Value {
    let identity = resolve_caller(rt, req.caller.as_deref());
    let running = rt.store.running_instances(&req.agent_name);
    let previous_status = if running.is_empty() { "stopped" } else { "running" };

    let _guard = rt.adapters.write_lock.lock().await;
    for instance in &running {
        rt.store.end_agent_instance(&instance.agent_instance_code);
        rt.store.append_lifecycle_event(&LifecycleEvent {
            agent_instance_code: instance.agent_instance_code.clone(),
            lifecycle_event_type: event_type.to_string(),
            lifecycle_detail: Some(format!("requested_by={}", identity.agent)),
            created_at: chrono::Utc::now(),
        });
    }
    drop(_guard);

    json!({
        "success": true,
        "target_agent": req.agent_name,
        "previous_status": previous_status,
        "new_status": "stopped",
        "instances_ended": running.len(),
        "requested_by": identity.agent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::entities::AgentInstanceRecord;

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

    fn running_instance(agent_code: &str, id: &str) -> AgentInstanceRecord {
        AgentInstanceRecord {
            agent_instance_code: id.to_string(),
            agent_code: agent_code.to_string(),
            model_code: None,
            ticket_code: None,
            spawned_by_agent_instance_code: None,
            craft_version_code: None,
            personality_version_code: None,
            started_at: chrono::Utc::now(),
            ended_at: None,
        }
    }

    #[tokio::test]
    async fn stops_every_running_instance() {
        let (rt, _d) = test_runtime();
        rt.store.save_agent_instance(&running_instance("mason", "inst-1"));
        rt.store.save_agent_instance(&running_instance("mason", "inst-2"));

        let result = decommission(&rt, LifecycleRequest { agent_name: "mason".into(), caller: Some("steve".into()) }).await;
        assert_eq!(result["success"], true);
        assert_eq!(result["instances_ended"], 2);
        assert!(rt.store.running_instances("mason").is_empty());
    }

    #[tokio::test]
    async fn idempotent_on_already_decommissioned_agent() {
        let (rt, _d) = test_runtime();
        rt.store.save_agent_instance(&running_instance("mason", "inst-1"));
        decommission(&rt, LifecycleRequest { agent_name: "mason".into(), caller: None }).await;

        let second = decommission(&rt, LifecycleRequest { agent_name: "mason".into(), caller: None }).await;
        assert_eq!(second["instances_ended"], 0);
    }

    #[tokio::test]
    async fn standdown_uses_standdown_event_type() {
        let (rt, _d) = test_runtime();
        rt.store.save_agent_instance(&running_instance("fresco", "inst-3"));
        let result = standdown(&rt, LifecycleRequest { agent_name: "fresco".into(), caller: None }).await;
        assert_eq!(result["success"], true);
        assert_eq!(result["instances_ended"], 1);
    }
}
