//! Tool handlers (spec §4.8): the coordination surface every RPC route in
//! `crate::routes_herd` thins out to. Each module owns one tool's logic as a
//! plain async function over `&Runtime`, returning the JSON dict the
//! original tools return — callers get structured `{success:false, error}`
//! shapes rather than HTTP error codes for anything short of malformed
//! input, matching spec §7's "surfaced to caller" policy.

pub mod assign;
pub mod assume;
pub mod catchup;
pub mod checkin;
pub mod create_ticket;
pub mod get_messages;
pub mod graph_query;
pub mod harvest;
pub mod lifecycle;
pub mod metrics;
pub mod recall;
pub mod record_decision;
pub mod review;
pub mod send;
pub mod spawn;
pub mod support;
pub mod transition;

use chrono::{DateTime, Utc};

use crate::entities::TicketRecord;
use crate::identity::{self, CallerIdentity};
use crate::runtime::Runtime;
use crate::tools::support::looks_like_tracker_id;

/// Resolves the caller's identity for a tool call: explicit `agent_name`
/// argument first, then the process-wide env fallbacks carried on
/// `RuntimeConfig`, then `"unknown"` (spec §6.4). Also registers a fresh
/// `AgentInstanceRecord` the first time an instance id is seen.
pub fn resolve_caller(rt: &Runtime, agent_name: Option<&str>) -> CallerIdentity {
    let identity = identity::resolve_identity(
        agent_name,
        rt.config.agent_name.as_deref(),
        rt.config.instance_id.as_deref(),
        rt.config.team.as_deref(),
    );
    identity::resolve_or_create_instance(&rt.store, &identity, "claude-sonnet-4");
    identity
}

pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// Ensures a ticket is present locally, fetching it from the tracker first
/// if it looks like a tracker id and isn't in the store yet (spec §4.8,
/// `herd_assign`/`herd_transition` step 2). Returns the (possibly
/// newly-registered) ticket, or `None` if it can't be found anywhere.
pub async fn ensure_ticket(rt: &Runtime, ticket_id: &str) -> Option<TicketRecord> {
    if let Some(ticket) = rt.store.get_ticket(ticket_id) {
        return Some(ticket);
    }
    if !looks_like_tracker_id(ticket_id) {
        return None;
    }
    let tickets = rt.adapters.tickets.as_ref()?;
    let remote = tickets.get(ticket_id).await?;
    let title = remote.get("title").and_then(|v| v.as_str()).unwrap_or(ticket_id).to_string();
    let description = remote.get("description").and_then(|v| v.as_str()).map(str::to_string);
    let ticket = TicketRecord::new(ticket_id.to_string(), title, description, None);
    rt.store.save_ticket(&ticket);
    Some(ticket)
}
