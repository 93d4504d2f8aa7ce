//! `herd_catchup` (spec §4.8, SPEC_FULL §11.3): assembles "what happened
//! while you were away" for a returning agent — ticket activity, git
//! history, tracker assignments, pending handoffs, recent HDRs, and the
//! caller's own recent decisions, all cut off at the caller's last session
//! end (capped at 7 days). Grounded on `herd_mcp/tools/catchup.py`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::runtime::Runtime;
use crate::store::queries::OperationalQueries;
use crate::tools::resolve_caller;
use crate::tools::support::{find_repo_root, get_handoffs, get_recent_hdrs, git_log_since};

const MAX_LOOKBACK_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
pub struct CatchupRequest {
    pub caller: Option<String>,
}

pub async fn execute(rt: &Runtime, req: CatchupRequest) -> Value {
    let identity = resolve_caller(rt, req.caller.as_deref());
    let floor = chrono::Utc::now() - chrono::Duration::days(MAX_LOOKBACK_DAYS);

    let cutoff = rt
        .store
        .latest_ended_instance(&identity.agent)
        .and_then(|i| i.ended_at)
        .map(|ended_at| ended_at.max(floor))
        .unwrap_or(floor);

    let repo_root = find_repo_root(&rt.config.project_path);
    let queries = OperationalQueries::new(&rt.store);

    let commits = git_log_since(&repo_root, cutoff, 50);
    let commit_lines: Vec<Value> =
        commits.iter().map(|c| json!({"sha": c.sha, "author": c.author, "date": c.date, "message": c.message})).collect();

    let handoffs = get_handoffs(&repo_root, cutoff);
    let handoff_names: Vec<String> = handoffs.into_iter().map(|h| h.filename).collect();

    let hdrs = get_recent_hdrs(&repo_root, cutoff);
    let hdr_entries: Vec<Value> = hdrs.into_iter().map(|h| json!({"filename": h.filename, "title": h.title})).collect();

    let decisions = queries.recent_decisions(cutoff).into_iter().filter(|d| d.decided_by == identity.agent).collect::<Vec<_>>();

    let mut tracker_tickets: Vec<Value> = Vec::new();
    if let Some(tickets) = &rt.adapters.tickets {
        if let Ok(list) = tickets.list(&json!({"assignee": identity.agent})).await {
            tracker_tickets = list;
        }
    }

    json!({
        "success": true,
        "agent": identity.agent,
        "since": cutoff,
        "commits": commit_lines,
        "pending_handoffs": handoff_names,
        "recent_hdrs": hdr_entries,
        "tracker_tickets": tracker_tickets,
        "recent_decisions": decisions,
    })
}
