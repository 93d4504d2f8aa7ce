//! `herd_get_messages` (spec §4.8): the drain-only half of `herd_checkin` —
//! no heartbeat, no context pane, same tier-based type filtering. Grounded
//! on `herd_mcp/tools/get_messages.py`, which keeps its own local tier
//! roster; here it simply calls into `crate::tiers` instead of duplicating
//! the classification.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::runtime::Runtime;
use crate::tiers;
use crate::tools::resolve_caller;

#[derive(Debug, Deserialize)]
pub struct GetMessagesRequest {
    pub agent_name: Option<String>,
}

pub async fn execute(rt: &Runtime, req: GetMessagesRequest) -> Value {
    let identity = resolve_caller(rt, req.agent_name.as_deref());
    let tier = tiers::classify(&identity.agent);

    let drained = rt.bus.read(&identity.agent, identity.instance.as_deref(), identity.team.as_deref()).await;
    let messages: Vec<&crate::bus::Message> = drained.iter().filter(|m| tier.allows_message_type(&m.msg_type)).collect();

    json!({
        "agent": identity.agent,
        "messages": messages,
        "count": messages.len(),
    })
}
