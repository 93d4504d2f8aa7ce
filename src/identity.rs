//! Identity resolver: maps an environment-provided agent name to a durable
//! instance id (spec §4.10/§6.4).

use chrono::Utc;

use crate::entities::{AgentInstanceRecord, LifecycleEvent};
use crate::store::sqlite::SqliteStore;

#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub agent: String,
    pub instance: Option<String>,
    pub team: Option<String>,
}

/// Resolves caller identity: explicit parameter wins, then the
/// `HERD_AGENT_NAME` environment fallback, then the literal `"unknown"`.
/// Instance id and team are read from environment only — a tool call has no
/// parameter for either.
pub fn resolve_identity(caller: Option<&str>, env_agent: Option<&str>, env_instance: Option<&str>, env_team: Option<&str>) -> CallerIdentity {
    let agent = caller
        .map(str::to_string)
        .or_else(|| env_agent.map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());
    CallerIdentity { agent, instance: env_instance.map(str::to_string), team: env_team.map(str::to_string) }
}

/// Ensures an `AgentInstanceRecord` exists for the resolved identity's
/// instance id, creating one (plus a "spawned" lifecycle event) if this is
/// the first time it's been seen. No-op when the identity carries no
/// instance id (the caller didn't set `HERD_INSTANCE_ID`).
pub fn resolve_or_create_instance(store: &SqliteStore, identity: &CallerIdentity, default_model: &str) -> Option<String> {
    let instance_id = identity.instance.as_ref()?;

    if store.latest_instance(&identity.agent).map(|i| &i.agent_instance_code == instance_id).unwrap_or(false) {
        return Some(instance_id.clone());
    }

    store.save_agent_instance(&AgentInstanceRecord {
        agent_instance_code: instance_id.clone(),
        agent_code: identity.agent.clone(),
        model_code: Some(default_model.to_string()),
        ticket_code: None,
        spawned_by_agent_instance_code: None,
        craft_version_code: None,
        personality_version_code: None,
        started_at: Utc::now(),
        ended_at: None,
    });
    store.append_lifecycle_event(&LifecycleEvent {
        agent_instance_code: instance_id.clone(),
        lifecycle_event_type: "spawned".to_string(),
        lifecycle_detail: None,
        created_at: Utc::now(),
    });
    Some(instance_id.clone())
}
