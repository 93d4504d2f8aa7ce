//! End-to-end scenarios from spec §8.4, driven over the HTTP tool-call
//! surface rather than calling bus/checkin methods directly, so these
//! exercise the whole stack: routing, auth guard, dispatch, and handler.

use serde_json::json;

use crate::common::{call_tool, test_client, test_runtime};

// --- Scenario A: direct send and drain ---

#[test]
fn scenario_a_direct_send_and_drain() {
    let (rt, _d) = test_runtime(None);
    let client = test_client(rt);

    let sent = call_tool(&client, "herd_send", json!({"to": "mason", "message": "build DBC-99", "agent_name": "steve"}));
    assert_eq!(sent["delivered"], true);

    let first = call_tool(&client, "herd_get_messages", json!({"agent_name": "mason"}));
    let messages = first["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["body"], "build DBC-99");

    let second = call_tool(&client, "herd_get_messages", json!({"agent_name": "mason"}));
    assert!(second["messages"].as_array().unwrap().is_empty());
}

// --- Scenario B: @anyone is first-come-first-served, mechanicals excluded ---

#[test]
fn scenario_b_anyone_excludes_mechanical() {
    let (rt, _d) = test_runtime(None);
    let client = test_client(rt);

    call_tool(&client, "herd_send", json!({"to": "@anyone", "message": "take this", "agent_name": "steve"}));

    let rook = call_tool(&client, "herd_get_messages", json!({"agent_name": "rook"}));
    assert!(rook["messages"].as_array().unwrap().is_empty(), "mechanical agent must never claim @anyone mail");

    let mason = call_tool(&client, "herd_get_messages", json!({"agent_name": "mason"}));
    assert_eq!(mason["messages"].as_array().unwrap().len(), 1);

    let fresco = call_tool(&client, "herd_get_messages", json!({"agent_name": "fresco"}));
    assert!(fresco["messages"].as_array().unwrap().is_empty(), "@anyone is consume-once");
}

// --- Scenario C: @everyone broadcast, once per reader key ---
//
// The HTTP tool surface resolves instance id from the single runtime's
// config (spec §6.4 — a tool call carries no instance parameter), so this
// drives the bus directly for the two distinct-instance readers and uses
// the tool surface only for the send, keeping the send leg end-to-end.

#[test]
fn scenario_c_everyone_broadcast_once_per_reader() {
    let (rt, _d) = test_runtime(None);
    let client = test_client(rt.clone());

    call_tool(&client, "herd_send", json!({"to": "@everyone", "message": "standup now", "agent_name": "steve"}));

    let first = tokio_test_block_on(rt.bus.read("mason", Some("inst-m1"), None));
    assert_eq!(first.len(), 1);
    let repeat = tokio_test_block_on(rt.bus.read("mason", Some("inst-m1"), None));
    assert!(repeat.is_empty(), "same reader key must not see the broadcast twice");

    let other = tokio_test_block_on(rt.bus.read("fresco", Some("inst-f1"), None));
    assert_eq!(other.len(), 1, "a distinct reader key still gets the broadcast");
}

/// Tiny blocking bridge so a `#[test]` (not `#[tokio::test]`) can drive the
/// async bus API, matching how `rocket::local::blocking::Client` keeps
/// these tests synchronous end to end.
fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
}

// --- Scenario D: mechanical tier filter via checkin ---

#[test]
fn scenario_d_mechanical_tier_filter_via_checkin() {
    let (rt, _d) = test_runtime(None);
    let client = test_client(rt);

    call_tool(&client, "herd_send", json!({"to": "rook", "message": "a", "type": "directive", "agent_name": "steve"}));
    call_tool(&client, "herd_send", json!({"to": "rook", "message": "b", "type": "inform", "agent_name": "mason"}));
    call_tool(&client, "herd_send", json!({"to": "rook", "message": "c", "type": "flag", "agent_name": "warden"}));

    let result = call_tool(&client, "herd_checkin", json!({"status": "ok", "agent_name": "rook"}));
    let messages = result["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["body"], "a");
    assert!(result["context"].is_null(), "mechanical tier has a zero context-pane budget");
}

// --- Scenario E: checkin context pane, team-scoped ---

#[test]
fn scenario_e_checkin_context_pane_excludes_self_and_counts_everyone() {
    let (rt, _d) = test_runtime(Some("avalon"));
    let client = test_client(rt.clone());

    tokio_test_block_on(rt.checkin.record("mason@avalon", "working DBC-99", None));
    tokio_test_block_on(rt.checkin.record("fresco@avalon", "designing", None));
    tokio_test_block_on(rt.checkin.record("steve@avalon", "coordinating", None));

    let result = call_tool(&client, "herd_checkin", json!({"status": "hi", "agent_name": "mason"}));
    let context = result["context"].as_str().expect("senior/execution tiers get a non-null context pane");

    assert!(context.contains("fresco"), "context pane: {context}");
    assert!(context.contains("steve"), "context pane: {context}");
    assert!(!context.contains("mason:"), "caller's own line must be excluded: {context}");
    assert!(context.ends_with("3 agents active."), "self is counted but not listed: {context}");
}

// --- Scenario F: token harvest conservation ---

#[test]
fn scenario_f_token_harvest_conservation() {
    let (rt, _d) = test_runtime(None);
    rt.store.upsert_model(&herd_runtime::entities::ModelRecord {
        model_code: "m1".into(),
        input_cost_per_m: 15.0,
        output_cost_per_m: 75.0,
        cache_read_cost_per_m: 1.5,
        cache_create_cost_per_m: 18.75,
    });
    rt.store.upsert_model(&herd_runtime::entities::ModelRecord {
        model_code: "m2".into(),
        input_cost_per_m: 3.0,
        output_cost_per_m: 15.0,
        cache_read_cost_per_m: 0.3,
        cache_create_cost_per_m: 3.75,
    });

    // `session_directory` resolves under the real `$HOME`, so rather than
    // mutating process-wide environment state, derive the real directory
    // for a throwaway project path and write the transcript straight there.
    let project_path = format!("/tmp/herd-scenario-f-{}", uuid::Uuid::new_v4());
    let session_dir = herd_runtime::tools::harvest::session_directory(&project_path);
    std::fs::create_dir_all(&session_dir).unwrap();
    std::fs::write(
        session_dir.join("session1.jsonl"),
        [
            json!({"type": "assistant", "message": {"model": "m1", "usage": {"input_tokens": 1000, "output_tokens": 500, "cache_read_input_tokens": 2000, "cache_creation_input_tokens": 1500}}}).to_string(),
            json!({"type": "assistant", "message": {"model": "m1", "usage": {"input_tokens": 500, "output_tokens": 250, "cache_read_input_tokens": 1000, "cache_creation_input_tokens": 0}}}).to_string(),
            json!({"type": "assistant", "message": {"model": "m2", "usage": {"input_tokens": 2000, "output_tokens": 1000, "cache_read_input_tokens": 3000, "cache_creation_input_tokens": 500}}}).to_string(),
        ]
        .join("\n"),
    )
    .unwrap();

    let client = test_client(rt.clone());
    let result = call_tool(
        &client,
        "herd_harvest_tokens",
        json!({"agent_instance_code": "inst-1", "project_path": project_path}),
    );
    let _ = std::fs::remove_dir_all(&session_dir);

    assert_eq!(result["records_written"], 2);
    let epoch = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH;
    let events: Vec<_> = rt.store.token_events_since(epoch).into_iter().filter(|e| e.model_code == "m1").collect();
    let total_input: i64 = events.iter().map(|e| e.token_input_count).sum();
    let total_output: i64 = events.iter().map(|e| e.token_output_count).sum();
    let total_cache_read: i64 = events.iter().map(|e| e.token_cache_read_count).sum();
    let total_cache_create: i64 = events.iter().map(|e| e.token_cache_create_count).sum();
    assert_eq!(total_input, 1500);
    assert_eq!(total_output, 750);
    assert_eq!(total_cache_read, 3000);
    assert_eq!(total_cache_create, 1500);

    let expected_m1_cost = 1500.0 * 15e-6 + 750.0 * 75e-6 + 3000.0 * 1.5e-6 + 1500.0 * 18.75e-6;
    let actual_m1_cost: f64 = events.iter().map(|e| e.token_cost_usd).sum();
    assert!((actual_m1_cost - expected_m1_cost).abs() < 1e-9);
}
