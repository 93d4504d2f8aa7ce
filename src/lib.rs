//! Herd coordination runtime: an in-process message bus, pull-based checkin
//! protocol, address routing, a durable activity ledger, and multi-store
//! fan-out (operational/semantic/structural) behind a small set of tool
//! handlers agents invoke over HTTP (spec §1–§2).
//!
//! Structured the way the teacher crate is: a library exposing a
//! `build_rocket`/`rocket` pair, managed Rocket state instead of hidden
//! globals, and one `AdHoc::on_liftoff` fairing per background task.

pub mod adapters;
pub mod address;
pub mod bus;
pub mod checkin;
pub mod config;
pub mod entities;
pub mod graph;
pub mod identity;
pub mod memory;
pub mod registrar;
pub mod routes;
pub mod runtime;
pub mod session;
pub mod store;
pub mod tiers;
pub mod tools;

use std::sync::Arc;

use rocket_cors::CorsOptions;

use config::RuntimeConfig;
use runtime::Runtime;

/// Builds and starts a `Runtime` from the process environment (spec §6.3),
/// then hands it to `build_rocket`. The default system prompt for the
/// Session Manager's subprocess-spawned sessions names the coordinator role;
/// a deployment wanting a different default sets `HERD_AGENT_NAME` before
/// boot and lets `herd_assume` supply the rest.
pub fn rocket() -> rocket::Rocket<rocket::Build> {
    let config = RuntimeConfig::from_env();
    let system_prompt = "You are the herd coordinator. Begin every session with herd_checkin.".to_string();
    let rt = Arc::new(Runtime::new(config, system_prompt));
    rt.start();
    build_rocket(rt)
}

/// Mounts the HTTP surface over an already-constructed `Runtime`. Split out
/// from `rocket()` so tests can hand in a `Runtime` pointed at a scratch
/// directory instead of the real environment (mirrors the teacher's
/// `rocket_with_db`/`build_rocket` split in `src/lib.rs`).
pub fn build_rocket(rt: Arc<Runtime>) -> rocket::Rocket<rocket::Build> {
    let cors = CorsOptions::default().to_cors().expect("Failed to create CORS");

    rocket::build()
        .manage(rt)
        .attach(cors)
        .mount("/", rocket::routes![routes::health, routes::call_tool])
        .attach(rocket::fairing::AdHoc::on_liftoff("Herd Runtime", |rocket| {
            Box::pin(async move {
                let rt = rocket.state::<Arc<Runtime>>().expect("runtime is always managed");
                println!("🐑 herd runtime online (project: {})", rt.config.project_path.display());
            })
        }))
}
