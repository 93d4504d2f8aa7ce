//! `herd_metrics` (spec §4.8): a single dispatch surface over
//! `OperationalQueries` for named analytics queries, each with an optional
//! `period` window. Grounded on `herd_mcp/tools/metrics.py`.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::runtime::Runtime;
use crate::store::queries::OperationalQueries;
use crate::tools::resolve_caller;

#[derive(Debug, Deserialize)]
pub struct MetricsRequest {
    pub query: String,
    pub period: Option<String>,
    pub group_by: Option<String>,
    pub caller: Option<String>,
}

pub async fn execute(rt: &Runtime, req: MetricsRequest) -> Value {
    let _identity = resolve_caller(rt, req.caller.as_deref());
    let queries = OperationalQueries::new(&rt.store);
    let since = req.period.as_deref().and_then(parse_period);

    match req.query.as_str() {
        "cost_per_ticket" | "token_costs" => {
            let summary = queries.cost_summary(since);
            json!({"success": true, "query": req.query, "result": summary})
        }
        "agent_performance" => {
            let agents = queries.active_agents();
            let stale = queries.stale_agents(1);
            json!({
                "success": true,
                "query": req.query,
                "result": {
                    "active_count": agents.len(),
                    "stale_count": stale.len(),
                    "active_agents": agents,
                },
            })
        }
        "model_efficiency" => {
            let summary = queries.cost_summary(since);
            json!({"success": true, "query": req.query, "result": {"by_model": summary.by_model, "total_cost_usd": summary.total_cost_usd}})
        }
        "review_effectiveness" | "review_stats" => {
            let summary = queries.review_summary(since);
            let mut result = json!(summary);
            if req.group_by.as_deref() == Some("category") {
                result["note"] = json!("grouping by category is not yet broken out; by_reviewer is returned instead");
            }
            json!({"success": true, "query": req.query, "result": result})
        }
        "sprint_velocity" | "velocity" => {
            let decisions = queries.recent_decisions(since.unwrap_or_else(default_sprint_cutoff));
            json!({
                "success": true,
                "query": req.query,
                "result": {"decisions_in_period": decisions.len(), "period_start": since.unwrap_or_else(default_sprint_cutoff)},
            })
        }
        "pipeline_efficiency" => {
            let blocked = queries.blocked_tickets(None);
            json!({"success": true, "query": req.query, "result": {"blocked_ticket_count": blocked.len(), "blocked_tickets": blocked}})
        }
        "headline" => {
            let summary = queries.cost_summary(since);
            let review_summary = queries.review_summary(since);
            let blocked = queries.blocked_tickets(None);
            json!({
                "success": true,
                "query": req.query,
                "result": {
                    "total_cost_usd": summary.total_cost_usd,
                    "total_tokens": summary.total_tokens,
                    "active_agents": queries.active_agents().len(),
                    "blocked_tickets": blocked.len(),
                    "review_pass_rate": review_summary.pass_rate,
                },
            })
        }
        other => json!({"success": false, "error": format!("Unknown query: {other}")}),
    }
}

fn default_sprint_cutoff() -> DateTime<Utc> {
    Utc::now() - Duration::days(14)
}

/// Parses the recognized `period` shorthand names plus an ISO
/// `"start..end"` range; `start` of the range is what's returned (the end
/// is implicitly "now" for every query this tool supports).
fn parse_period(period: &str) -> Option<DateTime<Utc>> {
    match period {
        "today" => Some(Utc::now() - Duration::hours(24)),
        "this_week" => Some(Utc::now() - Duration::days(7)),
        "this_sprint" => Some(default_sprint_cutoff()),
        "last_30d" => Some(Utc::now() - Duration::days(30)),
        other => other.split_once("..").and_then(|(start, _end)| crate::tools::parse_ts(start)),
    }
}
