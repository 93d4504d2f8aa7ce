//! Semantic query layer over `SqliteStore` (spec §4.5). Every method here
//! composes the typed accessors on `SqliteStore` rather than issuing raw SQL
//! directly — mirrors the original's preference for `StoreAdapter` +
//! `OperationalQueries` over ad-hoc SQL scattered through `tools/metrics.py`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entities::{AgentRecord, DecisionRecord, TicketEvent, TicketRecord};
use crate::store::sqlite::SqliteStore;

pub struct OperationalQueries<'a> {
    store: &'a SqliteStore,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostPerTicket {
    pub ticket_code: String,
    pub total_cost_usd: f64,
    pub total_tokens: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostSummary {
    pub total_tokens: i64,
    pub total_cost_usd: f64,
    pub by_agent: HashMap<String, f64>,
    pub by_model: HashMap<String, f64>,
    pub period_start: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewSummary {
    pub total_reviews: i64,
    pub pass_rate: f64,
    pub avg_findings_per_review: f64,
    pub by_reviewer: HashMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketTimeline {
    pub ticket: Option<TicketRecord>,
    pub events: Vec<TicketEvent>,
    pub total_elapsed_minutes: f64,
}

impl<'a> OperationalQueries<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        OperationalQueries { store }
    }

    pub fn active_agents(&self) -> Vec<AgentRecord> {
        self.store.list_agents(true)
    }

    pub fn ticket_timeline(&self, ticket_code: &str) -> TicketTimeline {
        let events = self.store.ticket_events(ticket_code);
        // `elapsed_minutes` is tracked per-transition by herd_transition and
        // embedded in the activity comment as "elapsed:<minutes>" when present;
        // absent for events that don't record a duration (e.g. "assigned").
        let total_elapsed_minutes: f64 = events
            .iter()
            .filter_map(|e| e.ticket_activity_comment.as_deref())
            .filter_map(|c| c.strip_prefix("elapsed:"))
            .filter_map(|m| m.parse::<f64>().ok())
            .sum();
        TicketTimeline { ticket: self.store.get_ticket(ticket_code), events, total_elapsed_minutes }
    }

    pub fn cost_summary(&self, since: Option<DateTime<Utc>>) -> CostSummary {
        let period_start = since.unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH);
        let events = self.store.token_events_since(period_start);

        let mut total_tokens = 0i64;
        let mut total_cost_usd = 0.0;
        let mut by_agent: HashMap<String, f64> = HashMap::new();
        let mut by_model: HashMap<String, f64> = HashMap::new();

        for event in &events {
            total_tokens += event.token_input_count
                + event.token_output_count
                + event.token_cache_read_count
                + event.token_cache_create_count;
            total_cost_usd += event.token_cost_usd;
            *by_agent.entry(event.agent_instance_code.clone()).or_insert(0.0) += event.token_cost_usd;
            *by_model.entry(event.model_code.clone()).or_insert(0.0) += event.token_cost_usd;
        }

        CostSummary { total_tokens, total_cost_usd, by_agent, by_model, period_start }
    }

    pub fn review_summary(&self, since: Option<DateTime<Utc>>) -> ReviewSummary {
        let since = since.unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH);
        let reviews = self.store.reviews_since(since);

        let total_reviews = reviews.len() as i64;
        let passed = reviews.iter().filter(|r| r.review_verdict.as_deref() == Some("pass")).count() as i64;
        let pass_rate = if total_reviews > 0 { passed as f64 / total_reviews as f64 } else { 0.0 };

        let mut by_reviewer: HashMap<String, i64> = HashMap::new();
        let mut total_findings = 0i64;
        for review in &reviews {
            *by_reviewer.entry(review.reviewer_agent_instance_code.clone()).or_insert(0) += 1;
            total_findings += self.store.review_findings(&review.review_code).len() as i64;
        }
        let avg_findings_per_review = if total_reviews > 0 { total_findings as f64 / total_reviews as f64 } else { 0.0 };

        ReviewSummary { total_reviews, pass_rate, avg_findings_per_review, by_reviewer }
    }

    pub fn blocked_tickets(&self, project_code: Option<&str>) -> Vec<TicketRecord> {
        self.store.list_tickets(Some("blocked"), project_code)
    }

    /// Running agents whose instance has no lifecycle event newer than `threshold_hours`.
    pub fn stale_agents(&self, threshold_hours: i64) -> Vec<AgentRecord> {
        let cutoff = Utc::now() - chrono::Duration::hours(threshold_hours);
        self.store
            .list_agents(true)
            .into_iter()
            .filter(|agent| {
                let latest = self.store.latest_instance(&agent.agent_code);
                match latest.and_then(|i| self.store.last_lifecycle_event_at(&i.agent_instance_code)) {
                    Some(last_event) => last_event < cutoff,
                    None => true,
                }
            })
            .collect()
    }

    pub fn review_round_count(&self, pr_code: &str) -> i64 {
        self.store.next_review_round(pr_code) - 1
    }

    pub fn recent_decisions(&self, since: DateTime<Utc>) -> Vec<DecisionRecord> {
        self.store.recent_decisions(since)
    }

    pub fn cost_per_ticket(&self, ticket_code: &str) -> CostPerTicket {
        let instance_codes = self.store.ticket_instance_codes(ticket_code);
        let events = self.store.token_events_for_instances(&instance_codes);
        let total_cost_usd = events.iter().map(|e| e.token_cost_usd).sum();
        let total_tokens = events
            .iter()
            .map(|e| e.token_input_count + e.token_output_count + e.token_cache_read_count + e.token_cache_create_count)
            .sum();
        CostPerTicket { ticket_code: ticket_code.to_string(), total_cost_usd, total_tokens }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AgentRecord, TicketEvent, TokenEvent};

    fn store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(dir.path().join("ops.db").to_str().unwrap());
        (store, dir)
    }

    #[test]
    fn timeline_delegates_to_store() {
        let (store, _d) = store();
        store.append_ticket_event(&TicketEvent::new("inst-1".into(), "DBC-1".into(), "created", None));
        let queries = OperationalQueries::new(&store);
        assert_eq!(queries.ticket_timeline("DBC-1").events.len(), 1);
    }

    #[test]
    fn blocked_tickets_filters_by_status() {
        let (store, _d) = store();
        let mut t = TicketRecord::new("DBC-2".into(), "t".into(), None, None);
        t.ticket_current_status = "blocked".to_string();
        store.save_ticket(&t);
        store.save_ticket(&TicketRecord::new("DBC-3".into(), "open one".into(), None, None));
        let queries = OperationalQueries::new(&store);
        let blocked = queries.blocked_tickets(None);
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].ticket_code, "DBC-2");
    }

    #[test]
    fn cost_summary_aggregates_by_model_and_agent() {
        let (store, _d) = store();
        store.append_token_event(&TokenEvent {
            agent_instance_code: "inst-1".into(),
            model_code: "claude-x".into(),
            token_input_count: 1000,
            token_output_count: 500,
            token_cache_read_count: 0,
            token_cache_create_count: 0,
            token_cost_usd: 1.5,
            token_context_utilization_pct: None,
            created_at: Utc::now(),
        });
        let queries = OperationalQueries::new(&store);
        let summary = queries.cost_summary(None);
        assert_eq!(summary.total_tokens, 1500);
        assert!((summary.total_cost_usd - 1.5).abs() < 1e-9);
        assert_eq!(summary.by_model.get("claude-x"), Some(&1.5));
    }

    #[test]
    fn stale_agents_have_no_recent_lifecycle_event() {
        let (store, _d) = store();
        store.save_agent(&AgentRecord {
            agent_code: "mason".into(),
            agent_role: "builder".into(),
            agent_status: "running".into(),
            default_model_code: None,
            created_at: Utc::now(),
            modified_at: Utc::now(),
            deleted_at: None,
        });
        let queries = OperationalQueries::new(&store);
        assert_eq!(queries.stale_agents(1).len(), 1);
    }
}
