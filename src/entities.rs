//! Operational entity and event types (spec §3.4).
//!
//! Entities are soft-deletable, timestamped records; events are append-only
//! facts attached to an entity by id, ordered by `created_at`. Field lists
//! are reverse-engineered from the raw-SQL fallbacks scattered across the
//! original tool implementations (`assign.py`, `review.py`, `metrics.py`,
//! `token_harvest.py`, `record_decision.py`, `spawn.py`) since the original's
//! `herd_core.types` module the tools import from was not itself present in
//! the retrieved source — this is the authoritative shape going forward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn now() -> DateTime<Utc> {
    Utc::now()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_code: String,
    pub agent_role: String,
    pub agent_status: String,
    pub default_model_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInstanceRecord {
    pub agent_instance_code: String,
    pub agent_code: String,
    pub model_code: Option<String>,
    pub ticket_code: Option<String>,
    pub spawned_by_agent_instance_code: Option<String>,
    pub craft_version_code: Option<String>,
    pub personality_version_code: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRecord {
    pub ticket_code: String,
    pub ticket_title: String,
    pub ticket_description: Option<String>,
    pub ticket_current_status: String,
    pub project_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TicketRecord {
    pub fn new(ticket_code: String, title: String, description: Option<String>, project_code: Option<String>) -> Self {
        let ts = now();
        TicketRecord {
            ticket_code,
            ticket_title: title,
            ticket_description: description,
            ticket_current_status: "open".to_string(),
            project_code,
            created_at: ts,
            modified_at: ts,
            deleted_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub pr_code: String,
    pub ticket_code: Option<String>,
    pub pr_url: Option<String>,
    pub pr_status: String,
    pub lines_added: Option<i64>,
    pub lines_removed: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub review_code: String,
    pub pr_code: String,
    pub reviewer_agent_instance_code: String,
    pub review_round: i64,
    pub review_verdict: Option<String>,
    pub review_duration_minutes: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFindingRecord {
    pub review_finding_code: String,
    pub review_code: String,
    pub finding_category: String,
    pub finding_severity: String,
    pub finding_description: String,
    pub finding_file_path: Option<String>,
    pub finding_line_number: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision_id: String,
    pub decision_type: String,
    pub context: Option<String>,
    pub decision: String,
    pub rationale: Option<String>,
    pub alternatives_considered: Option<String>,
    pub decided_by: String,
    pub ticket_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    pub model_code: String,
    pub input_cost_per_m: f64,
    pub output_cost_per_m: f64,
    pub cache_read_cost_per_m: f64,
    pub cache_create_cost_per_m: f64,
}

impl ModelRecord {
    pub fn unknown(model_code: &str) -> Self {
        ModelRecord {
            model_code: model_code.to_string(),
            input_cost_per_m: 0.0,
            output_cost_per_m: 0.0,
            cache_read_cost_per_m: 0.0,
            cache_create_cost_per_m: 0.0,
        }
    }

    pub fn cost(&self, input: i64, output: i64, cache_read: i64, cache_create: i64) -> f64 {
        let per_m = |n: i64, rate: f64| (n as f64 / 1_000_000.0) * rate;
        per_m(input, self.input_cost_per_m)
            + per_m(output, self.output_cost_per_m)
            + per_m(cache_read, self.cache_read_cost_per_m)
            + per_m(cache_create, self.cache_create_cost_per_m)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SprintRecord {
    pub sprint_code: String,
    pub sprint_started_at: DateTime<Utc>,
    pub sprint_ended_at: Option<DateTime<Utc>>,
}

// --- Events (append-only, ordered by created_at per entity_id) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub agent_instance_code: String,
    pub lifecycle_event_type: String,
    pub lifecycle_detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketEvent {
    pub agent_instance_code: String,
    pub ticket_code: String,
    pub ticket_event_type: String,
    pub ticket_status: Option<String>,
    pub ticket_activity_comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TicketEvent {
    pub fn new(agent_instance_code: String, ticket_code: String, event_type: &str, comment: Option<String>) -> Self {
        TicketEvent {
            agent_instance_code,
            ticket_code,
            ticket_event_type: event_type.to_string(),
            ticket_status: None,
            ticket_activity_comment: comment,
            created_at: now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrEvent {
    pub agent_instance_code: String,
    pub pr_code: String,
    pub review_event_type: String,
    pub review_activity_detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub agent_instance_code: String,
    pub review_code: String,
    pub pr_code: String,
    pub review_event_type: String,
    pub review_activity_detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEvent {
    pub agent_instance_code: String,
    pub model_code: String,
    pub token_input_count: i64,
    pub token_output_count: i64,
    pub token_cache_read_count: i64,
    pub token_cache_create_count: i64,
    pub token_cost_usd: f64,
    pub token_context_utilization_pct: Option<f64>,
    pub created_at: DateTime<Utc>,
}
