//! `herd_checkin` (spec §4.8): the canonical pull point. Every agent calls
//! this on its work loop instead of polling a dozen separate signals —
//! heartbeat, mail, and "who else is around" all land in one round trip.
//! Grounded on `herd_mcp/tools/checkin.py`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::address::Address;
use crate::checkin::{CheckinEntry, Staleness};
use crate::runtime::Runtime;
use crate::tiers::{self, Tier};
use crate::tools::resolve_caller;

#[derive(Debug, Deserialize)]
pub struct CheckinRequest {
    pub status: String,
    pub ticket: Option<String>,
    pub agent_name: Option<String>,
}

pub async fn execute(rt: &Runtime, req: CheckinRequest) -> Value {
    let identity = resolve_caller(rt, req.agent_name.as_deref());
    let tier = tiers::classify(&identity.agent);

    let self_addr = Address { agent: identity.agent.clone(), instance: identity.instance.clone(), team: identity.team.clone() }
        .to_string();
    rt.checkin.record(&self_addr, &req.status, req.ticket.as_deref()).await;

    let drained = rt.bus.read(&identity.agent, identity.instance.as_deref(), identity.team.as_deref()).await;
    let messages: Vec<&crate::bus::Message> = drained.iter().filter(|m| tier.allows_message_type(&m.msg_type)).collect();

    let context = if tier.context_budget() > 0 {
        build_context(rt, &identity.agent, identity.team.as_deref(), req.ticket.as_deref(), tier).await
    } else {
        None
    };

    json!({
        "messages": messages,
        "context": context,
        "heartbeat_ack": true,
    })
}

async fn build_context(rt: &Runtime, self_agent: &str, team: Option<&str>, ticket: Option<&str>, tier: Tier) -> Option<String> {
    let peers = rt.checkin.active(team).await;
    let total = peers.len();

    let assigned_agents: Option<Vec<String>> = match (ticket, &rt.graph) {
        (Some(ticket_id), Some(graph)) if graph.is_available() => {
            let rows = graph.query(
                "neighbors_by_edge",
                &json!({"rel_type": "AssignedTo", "to_label": "Ticket", "to_id": ticket_id}),
            );
            Some(
                rows.into_iter()
                    .filter_map(|row| row.get("from_id").and_then(|v| v.as_str()).map(str::to_string))
                    .collect(),
            )
        }
        _ => None,
    };

    let remaining: Vec<&CheckinEntry> = peers
        .iter()
        .filter(|e| e.agent != self_agent)
        .filter(|e| assigned_agents.as_ref().is_none_or(|allowed| allowed.contains(&e.agent)))
        .collect();

    if remaining.is_empty() {
        return None;
    }

    let now = chrono::Utc::now();
    let lines: Vec<String> = remaining
        .iter()
        .map(|e| {
            let addr = Address { agent: e.agent.clone(), instance: e.instance.clone(), team: e.team.clone() };
            let tag = match e.staleness_at(now) {
                Staleness::Fresh => String::new(),
                Staleness::Stale => " (stale)".to_string(),
                Staleness::Unresponsive => " (unresponsive)".to_string(),
            };
            format!("{addr}{tag}: {}", e.status)
        })
        .collect();

    let mut text = format!("{}. {total} agents active.", lines.join(". "));
    let budget_chars = tier.context_budget() * 4;
    if text.len() > budget_chars {
        text.truncate(budget_chars);
        text.push_str("...");
    }
    Some(text)
}
