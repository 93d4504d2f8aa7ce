//! HTTP surface (spec §6.1): the bearer-token auth guard, the always-public
//! `/health` route, and a single tool-dispatch route. Grounded on the
//! teacher's `AdminKey` request guard and `routes::system::health`
//! (`src/routes/mod.rs`, `src/routes/system.rs`) — same `Authorization:
//! Bearer <token>` convention, same bypass-when-unconfigured behavior
//! (the teacher has no such bypass for `AdminKey`, but `RuntimeConfig`'s
//! `api_token: Option<String>` mirrors `RateLimitConfig`'s
//! all-optional-with-defaults shape, and an absent token here means "auth
//! disabled" per spec §6.1, not "reject everything").
//!
//! The hosted RPC transport framework itself (how a real agent's tool-call
//! library frames a request) is out of scope (spec §1); this is the minimal
//! HTTP shell spec §6.1 still specifies regardless.

use std::sync::Arc;

use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use rocket::{get, post, State};
use serde_json::Value;

use crate::runtime::Runtime;

/// Present on every request; only rejects when `RuntimeConfig::api_token` is
/// set and the `Authorization` header doesn't carry a matching bearer token.
pub struct BearerAuth;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for BearerAuth {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Outcome::Success(rt) = req.guard::<&State<Arc<Runtime>>>().await else {
            return Outcome::Error((Status::InternalServerError, ()));
        };

        let Some(expected) = rt.config.api_token.as_deref() else {
            return Outcome::Success(BearerAuth);
        };

        let provided = req.headers().get_one("Authorization").and_then(|v| v.strip_prefix("Bearer "));
        match provided {
            Some(token) if token == expected => Outcome::Success(BearerAuth),
            _ => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// Always unauthenticated (spec §6.1): reports each adapter slot and store's
/// availability without requiring the caller to already hold a token.
#[get("/health")]
pub fn health(rt: &State<Arc<Runtime>>) -> Json<Value> {
    Json(rt.health())
}

#[derive(Debug, serde::Deserialize)]
pub struct ToolCall {
    pub args: Value,
}

/// Dispatches a named tool call. Unknown tool names are a `Fatal` error per
/// spec §7 ("bad dispatch") and propagate as a 500; everything else —
/// including malformed per-tool arguments — comes back as 200 with a
/// `{"success": false, "error": ...}` body, since tool handlers never raise.
#[post("/tools/<name>", format = "json", data = "<body>")]
pub async fn call_tool(
    name: &str,
    body: Json<ToolCall>,
    _auth: BearerAuth,
    rt: &State<Arc<Runtime>>,
) -> Result<Json<Value>, Status> {
    match crate::registrar::dispatch(rt, name, body.into_inner().args).await {
        Some(result) => Ok(Json(result)),
        None => Err(Status::InternalServerError),
    }
}
