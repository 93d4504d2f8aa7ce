//! `herd_transition` (spec §4.8): moves a ticket to a new status, recording
//! elapsed time since its previous transition. Grounded on
//! `herd_mcp/tools/transition.py`.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::entities::TicketEvent;
use crate::runtime::Runtime;
use crate::tools::support::looks_like_tracker_id;
use crate::tools::{ensure_ticket, resolve_caller};

/// Statuses the tracker adapter recognizes; unrecognized `to_status` values
/// still update the local ticket but skip the tracker sync silently (spec
/// §4.8).
static TRACKER_STATUS_MAP: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("backlog", "Backlog"),
        ("assigned", "Todo"),
        ("in_progress", "In Progress"),
        ("blocked", "Blocked"),
        ("in_review", "In Review"),
        ("done", "Done"),
    ])
});

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub ticket_id: String,
    pub to_status: String,
    pub blocked_by: Option<String>,
    pub note: Option<String>,
    pub caller: Option<String>,
}

pub async fn execute(rt: &Runtime, req: TransitionRequest) -> Value {
    if req.to_status.trim().is_empty() {
        return json!({"success": false, "error": "to_status is required"});
    }

    let Some(ticket) = ensure_ticket(rt, &req.ticket_id).await else {
        return json!({"success": false, "error": format!("ticket not found: {}", req.ticket_id)});
    };

    let identity = resolve_caller(rt, req.caller.as_deref());
    let previous_status = ticket.ticket_current_status.clone();
    let event_type = if req.to_status == "blocked" { "blocked" } else { "status_changed" };

    let previous_transition_at = rt.store.ticket_events(&req.ticket_id).last().map(|e| e.created_at);
    let elapsed_minutes = previous_transition_at
        .map(|prev| (chrono::Utc::now() - prev).num_seconds() as f64 / 60.0);

    let instance_code =
        rt.store.latest_instance(&identity.agent).map(|i| i.agent_instance_code).unwrap_or_default();

    let _guard = rt.adapters.write_lock.lock().await;
    let mut event = TicketEvent::new(instance_code, req.ticket_id.clone(), event_type, req.note.clone());
    event.ticket_status = Some(req.to_status.clone());
    rt.store.append_ticket_event(&event);
    rt.store.set_ticket_status(&req.ticket_id, &req.to_status);
    drop(_guard);

    let mut result = json!({
        "success": true,
        "transition_id": event.created_at.to_rfc3339(),
        "ticket": {
            "id": req.ticket_id,
            "previous_status": previous_status,
            "new_status": req.to_status,
        },
        "event_type": event_type,
        "elapsed_minutes": elapsed_minutes,
        "blocked_by": req.blocked_by,
    });

    if looks_like_tracker_id(&req.ticket_id) {
        match TRACKER_STATUS_MAP.get(req.to_status.as_str()) {
            Some(external_status) => {
                if let Some(tickets) = &rt.adapters.tickets {
                    match tickets.transition(&req.ticket_id, external_status, req.note.as_deref(), req.blocked_by.as_deref()).await {
                        Ok(_) => result["linear_synced"] = json!(true),
                        Err(e) => {
                            result["linear_synced"] = json!(false);
                            result["linear_sync_error"] = json!(e);
                        }
                    }
                }
            }
            None => {
                // Unrecognized to_status: local store already updated, tracker sync skipped silently.
            }
        }
    }

    if let Some(graph) = &rt.graph {
        let _ = graph.merge_node("Ticket", &json!({"id": req.ticket_id, "status": req.to_status}));
    }

    result
}
