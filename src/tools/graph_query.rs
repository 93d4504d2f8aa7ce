//! `herd_graph` (spec §4.8): a thin wrapper over `StructuralGraph`'s
//! merge/edge/query surface, dispatching on an `action` field since the
//! three operations have distinct argument shapes. Grounded on
//! `herd_mcp/tools/graph.py`.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::runtime::Runtime;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GraphRequest {
    MergeNode { label: String, props: Value },
    CreateEdge { rel_type: String, from_label: String, from_id: String, to_label: String, to_id: String, props: Option<Value> },
    Query { query: String, params: Value },
}

pub async fn execute(rt: &Runtime, req: GraphRequest) -> Value {
    let Some(graph) = &rt.graph else {
        return json!({"success": false, "error": "structural graph not configured"});
    };

    match req {
        GraphRequest::MergeNode { label, props } => match graph.merge_node(&label, &props) {
            Ok(()) => json!({"success": true}),
            Err(e) => json!({"success": false, "error": e}),
        },
        GraphRequest::CreateEdge { rel_type, from_label, from_id, to_label, to_id, props } => {
            match graph.create_edge(&rel_type, &from_label, &from_id, &to_label, &to_id, props) {
                Ok(()) => json!({"success": true}),
                Err(e) => json!({"success": false, "error": e}),
            }
        }
        GraphRequest::Query { query, params } => {
            let rows = graph.query(&query, &params);
            json!({"success": true, "rows": rows})
        }
    }
}
