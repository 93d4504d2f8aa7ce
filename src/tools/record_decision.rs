//! `herd_record_decision` (spec §4.8): persists a decision record and posts a
//! best-effort notification to the decisions channel. Grounded on
//! `herd_mcp/tools/record_decision.py`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::entities::DecisionRecord;
use crate::runtime::Runtime;
use crate::tools::resolve_caller;

#[derive(Debug, Deserialize)]
pub struct RecordDecisionRequest {
    pub decision_type: String,
    pub context: String,
    pub decision: String,
    pub rationale: Option<String>,
    pub alternatives_considered: Option<String>,
    pub ticket_code: Option<String>,
    pub caller: Option<String>,
}

pub async fn execute(rt: &Runtime, req: RecordDecisionRequest) -> Value {
    if req.decision_type.trim().is_empty() || req.decision.trim().is_empty() {
        return json!({"success": false, "error": "decision_type and decision are required"});
    }

    let identity = resolve_caller(rt, req.caller.as_deref());
    let decision_id = uuid::Uuid::new_v4().to_string();

    let record = DecisionRecord {
        decision_id: decision_id.clone(),
        decision_type: req.decision_type.clone(),
        context: Some(req.context.clone()),
        decision: req.decision.clone(),
        rationale: req.rationale.clone(),
        alternatives_considered: req.alternatives_considered.clone(),
        decided_by: identity.agent.clone(),
        ticket_code: req.ticket_code.clone(),
        created_at: chrono::Utc::now(),
        deleted_at: None,
    };

    let _guard = rt.adapters.write_lock.lock().await;
    rt.store.save_decision(&record);
    drop(_guard);

    let body = format!(
        "**Decision recorded** ({})\n> {}\n\n**Decision:** {}\n**Rationale:** {}\nDecided by: {}",
        req.decision_type,
        req.context,
        req.decision,
        req.rationale.as_deref().unwrap_or("(none given)"),
        identity.agent,
    );

    let (posted_to_slack, notify_error) = match &rt.adapters.notify {
        Some(notify) => match notify.post(&body, Some("decisions"), None, None).await {
            Ok(_) => (true, None),
            Err(e) => (false, Some(e)),
        },
        None => (false, Some("NotifyAdapter not configured".to_string())),
    };

    json!({
        "success": true,
        "decision_id": decision_id,
        "posted_to_slack": posted_to_slack,
        "notify_error": notify_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    fn test_runtime() -> (Runtime, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RuntimeConfig::default();
        config.project_path = dir.path().to_path_buf();
        config.db_path = dir.path().join("herd.db");
        config.memory_path = dir.path().join("memory.db");
        config.graph_path = dir.path().join("graph.db");
        config.bus_path = dir.path().join("messages");
        (Runtime::new(config, "prompt".to_string()), dir)
    }

    #[tokio::test]
    async fn rejects_empty_decision() {
        let (rt, _d) = test_runtime();
        let result = execute(
            &rt,
            RecordDecisionRequest {
                decision_type: "architecture".into(),
                context: "ctx".into(),
                decision: "   ".into(),
                rationale: None,
                alternatives_considered: None,
                ticket_code: None,
                caller: None,
            },
        )
        .await;
        assert_eq!(result["success"], false);
    }

    #[tokio::test]
    async fn persists_decision_and_reports_notify_failure_without_adapter() {
        let (rt, _d) = test_runtime();
        let result = execute(
            &rt,
            RecordDecisionRequest {
                decision_type: "architecture".into(),
                context: "ctx".into(),
                decision: "use sqlite".into(),
                rationale: Some("simplicity".into()),
                alternatives_considered: None,
                ticket_code: None,
                caller: Some("steve".into()),
            },
        )
        .await;
        assert_eq!(result["success"], true);
        assert_eq!(result["posted_to_slack"], false);
        let decisions = rt.store.recent_decisions(chrono::Utc::now() - chrono::Duration::hours(1));
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].decided_by, "steve");
    }
}
