//! `herd_send` (spec §4.8): builds a canonical `from` address out of caller
//! identity + instance + team and hands the message to the bus. Grounded on
//! `herd_mcp/server.py`'s `herd_send` wrapper, which assembles `from_parts`
//! the same way before calling `bus.send`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::runtime::Runtime;
use crate::tools::resolve_caller;

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub to: String,
    pub message: String,
    #[serde(rename = "type", default = "default_type")]
    pub msg_type: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    pub agent_name: Option<String>,
}

fn default_type() -> String {
    "inform".to_string()
}

fn default_priority() -> String {
    "normal".to_string()
}

pub async fn execute(rt: &Runtime, req: SendRequest) -> Value {
    let identity = resolve_caller(rt, req.agent_name.as_deref());

    let mut from = identity.agent.clone();
    if let Some(instance) = &identity.instance {
        from = format!("{from}.{instance}");
    }
    if let Some(team) = &identity.team {
        from = format!("{from}@{team}");
    }

    let msg = rt.bus.send(&from, &req.to, &req.message, &req.msg_type, &req.priority).await;

    json!({
        "message_id": msg.id,
        "delivered": true,
        "type": msg.msg_type,
        "priority": msg.priority,
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
    async fn send_composes_from_with_instance_and_team() {
        let (rt, _d) = test_runtime();
        let req = SendRequest {
            to: "mason".to_string(),
            message: "build DBC-1".to_string(),
            msg_type: "directive".to_string(),
            priority: "high".to_string(),
            agent_name: Some("steve".to_string()),
        };
        let result = execute(&rt, req).await;
        assert_eq!(result["delivered"], true);
        assert_eq!(result["type"], "directive");

        let delivered = rt.bus.read("mason", None, None).await;
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].from_addr, "steve");
    }
}
