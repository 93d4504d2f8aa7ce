//! `herd_harvest_tokens` (spec §4.8, scenario F): aggregates token usage
//! from the subprocess host's own session transcripts and books a `Token`
//! event per model with pricing looked up from the `Model` entity.
//! Grounded on `herd_mcp/tools/token_harvest.py`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};

use crate::entities::TokenEvent;
use crate::runtime::Runtime;

#[derive(Debug, Deserialize)]
pub struct HarvestRequest {
    pub agent_instance_code: String,
    pub project_path: String,
}

#[derive(Default, Clone, Copy)]
struct Usage {
    input: i64,
    output: i64,
    cache_read: i64,
    cache_create: i64,
}

/// Mirrors the CLI's own transcript-directory naming: the absolute project
/// path with every `/` replaced by `-` (and a leading `-` for the root
/// slash), under `~/.claude/projects/`.
pub fn session_directory(project_path: &str) -> PathBuf {
    let canonical = Path::new(project_path).to_string_lossy().replace('/', "-");
    let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
    PathBuf::from(home).join(".claude").join("projects").join(canonical)
}

/// Scans every `*.jsonl` transcript in `dir`, summing `usage` fields from
/// assistant-role messages, keyed by model. Missing directory, unreadable
/// files, and malformed lines are all silently skipped (spec §4.8 step 2,
/// §7 "malformed transcript lines during token harvest").
fn aggregate_usage(dir: &Path) -> HashMap<String, Usage> {
    let mut totals: HashMap<String, Usage> = HashMap::new();
    let Ok(entries) = std::fs::read_dir(dir) else { return totals };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(&path) else { continue };
        for line in content.lines() {
            let Ok(value) = serde_json::from_str::<Value>(line) else { continue };
            if value.get("type").and_then(|t| t.as_str()) != Some("assistant") {
                continue;
            }
            let Some(usage) = value.pointer("/message/usage") else { continue };
            let Some(model) = value.pointer("/message/model").and_then(|m| m.as_str()) else { continue };

            let get = |key: &str| usage.get(key).and_then(|v| v.as_i64()).unwrap_or(0);
            let entry = totals.entry(model.to_string()).or_default();
            entry.input += get("input_tokens");
            entry.output += get("output_tokens");
            entry.cache_read += get("cache_read_input_tokens");
            entry.cache_create += get("cache_creation_input_tokens");
        }
    }
    totals
}

pub async fn execute(rt: &Runtime, req: HarvestRequest) -> Value {
    let dir = session_directory(&req.project_path);
    let totals = aggregate_usage(&dir);

    let mut total_cost_usd = 0.0;
    let mut records_written = 0usize;

    let _guard = rt.adapters.write_lock.lock().await;
    for (model_code, usage) in &totals {
        let model = rt.store.get_model(model_code);
        let cost = model.cost(usage.input, usage.output, usage.cache_read, usage.cache_create);
        total_cost_usd += cost;

        rt.store.append_token_event(&TokenEvent {
            agent_instance_code: req.agent_instance_code.clone(),
            model_code: model_code.clone(),
            token_input_count: usage.input,
            token_output_count: usage.output,
            token_cache_read_count: usage.cache_read,
            token_cache_create_count: usage.cache_create,
            token_cost_usd: cost,
            token_context_utilization_pct: None,
            created_at: chrono::Utc::now(),
        });
        records_written += 1;
    }
    drop(_guard);

    json!({
        "success": true,
        "records_written": records_written,
        "total_cost_usd": total_cost_usd,
        "models_processed": totals.keys().cloned().collect::<Vec<_>>(),
        "session_directory": dir.to_string_lossy(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::entities::ModelRecord;
    use std::io::Write;

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

    fn write_transcript(dir: &Path, lines: &[Value]) {
        std::fs::create_dir_all(dir).unwrap();
        let mut f = std::fs::File::create(dir.join("session1.jsonl")).unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
    }

    #[tokio::test]
    async fn missing_session_directory_yields_zero_records() {
        let (rt, _d) = test_runtime();
        let result = execute(&rt, HarvestRequest { agent_instance_code: "inst-1".into(), project_path: "/nope/not/real".into() }).await;
        assert_eq!(result["success"], true);
        assert_eq!(result["records_written"], 0);
    }

    #[tokio::test]
    async fn aggregates_usage_by_model_and_computes_cost() {
        let (rt, _d) = test_runtime();
        rt.store.upsert_model(&ModelRecord {
            model_code: "m1".into(),
            input_cost_per_m: 15.0,
            output_cost_per_m: 75.0,
            cache_read_cost_per_m: 1.5,
            cache_create_cost_per_m: 18.75,
        });

        let transcript_dir = tempfile::tempdir().unwrap();
        write_transcript(
            transcript_dir.path(),
            &[
                json!({"type": "assistant", "message": {"model": "m1", "usage": {"input_tokens": 1000, "output_tokens": 500, "cache_read_input_tokens": 2000, "cache_creation_input_tokens": 1500}}}),
                json!({"type": "assistant", "message": {"model": "m1", "usage": {"input_tokens": 500, "output_tokens": 250, "cache_read_input_tokens": 1000, "cache_creation_input_tokens": 0}}}),
                json!({"type": "assistant", "message": {"model": "m2", "usage": {"input_tokens": 2000, "output_tokens": 1000, "cache_read_input_tokens": 3000, "cache_creation_input_tokens": 500}}}),
                json!({"type": "user", "message": {"content": "hi"}}),
            ],
        );

        let totals = aggregate_usage(transcript_dir.path());
        assert_eq!(totals.len(), 2);
        let m1 = totals.get("m1").unwrap();
        assert_eq!(m1.input, 1500);
        assert_eq!(m1.output, 750);
        assert_eq!(m1.cache_read, 3000);
        assert_eq!(m1.cache_create, 1500);

        let m1_cost = rt.store.get_model("m1").cost(1500, 750, 3000, 1500);
        let expected = 1500.0 * 15e-6 + 750.0 * 75e-6 + 3000.0 * 1.5e-6 + 1500.0 * 18.75e-6;
        assert!((m1_cost - expected).abs() < 1e-9);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_transcript(dir.path(), &[]);
        std::fs::write(dir.path().join("session1.jsonl"), "not json\n{\"type\": \"assistant\"}\n").unwrap();
        let totals = aggregate_usage(dir.path());
        assert!(totals.is_empty());
    }
}
