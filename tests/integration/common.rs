use std::sync::Arc;

use herd_runtime::config::RuntimeConfig;
use herd_runtime::runtime::Runtime;
use rocket::local::blocking::Client;

/// Builds a `Runtime` pointed at a scratch project directory plus a
/// `Client` mounted over it, the way `src/lib.rs`'s own tests do. The
/// `TempDir` must outlive the client or the sqlite files disappear out
/// from under it.
pub fn test_runtime(team: Option<&str>) -> (Arc<Runtime>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RuntimeConfig::default();
    config.project_path = dir.path().to_path_buf();
    config.db_path = dir.path().join("herd.db");
    config.memory_path = dir.path().join("memory.db");
    config.graph_path = dir.path().join("graph.db");
    config.bus_path = dir.path().join("messages");
    config.team = team.map(str::to_string);
    let rt = Arc::new(Runtime::new(config, "prompt".to_string()));
    (rt, dir)
}

pub fn test_client(rt: Arc<Runtime>) -> Client {
    Client::tracked(herd_runtime::build_rocket(rt)).expect("valid rocket instance")
}

pub fn call_tool(client: &Client, name: &str, args: serde_json::Value) -> serde_json::Value {
    use rocket::http::ContentType;
    let res = client
        .post(format!("/tools/{name}"))
        .header(ContentType::JSON)
        .body(serde_json::json!({ "args": args }).to_string())
        .dispatch();
    assert_eq!(res.status(), rocket::http::Status::Ok, "tool call to {name} did not reach the handler");
    res.into_json().unwrap()
}
