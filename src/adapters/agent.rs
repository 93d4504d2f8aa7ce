//! `Agent` port: the subprocess-spawning back-end that actually brings an
//! agent instance to life (spec §4.4). The runtime never spawns processes
//! itself through this port — that is what the Session Manager does for
//! interactive chat-sourced sessions; this port covers the external fleet
//! manager a `herd_spawn` call hands off to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnResult {
    pub instance_id: String,
    pub agent: String,
    pub ticket_id: Option<String>,
    pub model: String,
    pub worktree: Option<String>,
    pub branch: Option<String>,
    pub spawned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub instance_id: String,
    pub state: String,
    pub last_seen: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait AgentAdapter: Send + Sync {
    async fn is_active(&self, agent_code: &str) -> bool;
    async fn spawn(&self, role: &str, ticket_id: Option<&str>, context: &str, model: Option<&str>) -> Result<SpawnResult, String>;
    async fn get_status(&self, instance_id: &str) -> Result<AgentStatus, String>;
    async fn stop(&self, instance_id: &str) -> Result<(), String>;
}
