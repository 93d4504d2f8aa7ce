//! `herd_review` (spec §4.8): records a PR review and its findings, posts a
//! formatted summary to the code host and the notification channel in
//! parallel, and reports each leg's outcome independently. Grounded on
//! `herd_mcp/tools/review.py`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::entities::{ReviewEvent, ReviewFindingRecord, ReviewRecord};
use crate::runtime::Runtime;
use crate::tools::resolve_caller;

#[derive(Debug, Deserialize)]
pub struct Finding {
    pub category: String,
    pub severity: String,
    pub description: String,
    pub file_path: Option<String>,
    pub line_number: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub pr_number: String,
    pub ticket_id: Option<String>,
    pub verdict: String,
    #[serde(default)]
    pub findings: Vec<Finding>,
    pub caller: Option<String>,
}

const VALID_VERDICTS: [&str; 3] = ["pass", "fail", "pass_with_advisory"];

pub async fn execute(rt: &Runtime, req: ReviewRequest) -> Value {
    if !VALID_VERDICTS.contains(&req.verdict.as_str()) {
        return json!({"success": false, "error": format!("Unknown verdict '{}'. Valid values: {:?}", req.verdict, VALID_VERDICTS)});
    }

    let identity = resolve_caller(rt, req.caller.as_deref());
    let reviewer_instance = rt.store.latest_instance(&identity.agent).map(|i| i.agent_instance_code).unwrap_or_default();

    let review_round = rt.store.next_review_round(&req.pr_number);
    let review_code = uuid::Uuid::new_v4().to_string();

    let _guard = rt.adapters.write_lock.lock().await;
    rt.store.save_review(&ReviewRecord {
        review_code: review_code.clone(),
        pr_code: req.pr_number.clone(),
        reviewer_agent_instance_code: reviewer_instance.clone(),
        review_round,
        review_verdict: Some(req.verdict.clone()),
        review_duration_minutes: None,
        created_at: chrono::Utc::now(),
    });
    for finding in &req.findings {
        rt.store.save_review_finding(&ReviewFindingRecord {
            review_finding_code: uuid::Uuid::new_v4().to_string(),
            review_code: review_code.clone(),
            finding_category: finding.category.clone(),
            finding_severity: finding.severity.clone(),
            finding_description: finding.description.clone(),
            finding_file_path: finding.file_path.clone(),
            finding_line_number: finding.line_number,
            created_at: chrono::Utc::now(),
        });
    }
    rt.store.append_review_event(&ReviewEvent {
        agent_instance_code: reviewer_instance,
        review_code: review_code.clone(),
        pr_code: req.pr_number.clone(),
        review_event_type: "submitted".to_string(),
        review_activity_detail: Some(req.verdict.clone()),
        created_at: chrono::Utc::now(),
    });
    drop(_guard);

    let body = format_review_body(&req);

    let (github_result, slack_result) = tokio::join!(post_to_github(rt, &req.pr_number, &body), post_to_notify(rt, &body));

    let github_posted = github_result.is_ok();
    let slack_posted = slack_result.is_ok();

    json!({
        "success": true,
        "review_id": review_code,
        "posted": github_posted && slack_posted,
        "github_posted": github_posted,
        "github_error": github_result.err(),
        "slack_posted": slack_posted,
        "slack_error": slack_result.err(),
        "findings_count": req.findings.len(),
        "review_round": review_round,
        "ticket_id": req.ticket_id,
    })
}

fn format_review_body(req: &ReviewRequest) -> String {
    let blocking: Vec<&Finding> = req.findings.iter().filter(|f| f.severity == "blocking").collect();
    let advisory: Vec<&Finding> = req.findings.iter().filter(|f| f.severity != "blocking").collect();

    let mut body = format!("## Review round {} — verdict: {}\n\n", "n/a", req.verdict);
    body = body.replacen("n/a", "", 1);

    if !blocking.is_empty() {
        body.push_str("### Blocking\n");
        for f in &blocking {
            body.push_str(&format!("- [{}] {} ({})\n", f.category, f.description, f.file_path.as_deref().unwrap_or("-")));
        }
    }
    if !advisory.is_empty() {
        body.push_str("\n### Advisory\n");
        for f in &advisory {
            body.push_str(&format!("- [{}] {} ({})\n", f.category, f.description, f.file_path.as_deref().unwrap_or("-")));
        }
    }
    if req.findings.is_empty() {
        body.push_str("No findings.\n");
    }
    body
}

async fn post_to_github(rt: &Runtime, pr_number: &str, body: &str) -> Result<(), String> {
    match &rt.adapters.repo {
        Some(repo) => repo.add_pr_comment(pr_number, body).await,
        None => Err("RepoAdapter not configured".to_string()),
    }
}

async fn post_to_notify(rt: &Runtime, body: &str) -> Result<(), String> {
    match &rt.adapters.notify {
        Some(notify) => notify.post(body, None, None, None).await.map(|_| ()),
        None => Err("NotifyAdapter not configured".to_string()),
    }
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
    async fn rejects_unknown_verdict() {
        let (rt, _d) = test_runtime();
        let result =
            execute(&rt, ReviewRequest { pr_number: "42".into(), ticket_id: None, verdict: "meh".into(), findings: vec![], caller: None })
                .await;
        assert_eq!(result["success"], false);
    }

    #[tokio::test]
    async fn review_round_increments_per_pr() {
        let (rt, _d) = test_runtime();
        let first =
            execute(&rt, ReviewRequest { pr_number: "42".into(), ticket_id: None, verdict: "pass".into(), findings: vec![], caller: None })
                .await;
        let second =
            execute(&rt, ReviewRequest { pr_number: "42".into(), ticket_id: None, verdict: "fail".into(), findings: vec![], caller: None })
                .await;
        assert_eq!(first["review_round"], 1);
        assert_eq!(second["review_round"], 2);
    }

    #[tokio::test]
    async fn without_adapters_both_legs_report_failure_but_tool_succeeds() {
        let (rt, _d) = test_runtime();
        let result =
            execute(&rt, ReviewRequest { pr_number: "42".into(), ticket_id: None, verdict: "pass".into(), findings: vec![], caller: None })
                .await;
        assert_eq!(result["success"], true);
        assert_eq!(result["posted"], false);
        assert_eq!(result["github_posted"], false);
        assert_eq!(result["slack_posted"], false);
    }

    #[tokio::test]
    async fn findings_are_persisted() {
        let (rt, _d) = test_runtime();
        let result = execute(
            &rt,
            ReviewRequest {
                pr_number: "42".into(),
                ticket_id: None,
                verdict: "fail".into(),
                findings: vec![Finding {
                    category: "correctness".into(),
                    severity: "blocking".into(),
                    description: "off by one".into(),
                    file_path: Some("src/lib.rs".into()),
                    line_number: Some(10),
                }],
                caller: None,
            },
        )
        .await;
        assert_eq!(result["findings_count"], 1);
        let review_code = result["review_id"].as_str().unwrap();
        assert_eq!(rt.store.review_findings(review_code).len(), 1);
    }
}
