//! Owns every process-wide resource a tool handler needs: the bus, the
//! checkin registry, the three stores, and the adapter registry (spec §9,
//! "Singleton process-wide state → explicit lifecycle"). Constructed once at
//! process start and passed around as a shared handle — no hidden globals,
//! no lazily-initialized statics.

use std::sync::Arc;

use crate::adapters::AdapterRegistry;
use crate::bus::MessageBus;
use crate::checkin::CheckinRegistry;
use crate::config::RuntimeConfig;
use crate::graph::StructuralGraph;
use crate::memory::SemanticMemory;
use crate::session::SessionManager;
use crate::store::sqlite::SqliteStore;

pub struct Runtime {
    pub config: RuntimeConfig,
    pub bus: MessageBus,
    pub checkin: CheckinRegistry,
    pub store: SqliteStore,
    pub memory: Option<SemanticMemory>,
    pub graph: Option<StructuralGraph>,
    pub adapters: AdapterRegistry,
    pub sessions: Arc<SessionManager>,
}

impl Runtime {
    /// Opens every store at the paths named by `config`, creating directories
    /// on demand. The vector and graph stores degrade to `None` rather than
    /// failing the whole runtime — their `is_available()`/absence is exactly
    /// the "not configured" failure mode tool handlers already expect (spec
    /// §4.4/§4.6/§4.7).
    pub fn new(config: RuntimeConfig, system_prompt: String) -> Self {
        let store = SqliteStore::new(config.db_path.to_string_lossy().as_ref());

        let memory = match SemanticMemory::new(config.memory_path.to_string_lossy().as_ref()) {
            Ok(m) => Some(m),
            Err(e) => {
                eprintln!("⚠️ runtime: semantic memory unavailable: {e}");
                None
            }
        };

        let graph = match StructuralGraph::new(config.graph_path.to_string_lossy().as_ref()) {
            Ok(g) => Some(g),
            Err(e) => {
                eprintln!("⚠️ runtime: structural graph unavailable: {e}");
                None
            }
        };

        let bus = MessageBus::new(&config.bus_path);
        let checkin = CheckinRegistry::new();
        let idle_timeout = std::time::Duration::from_secs(config.idle_timeout_secs);
        let sessions = SessionManager::new(system_prompt, idle_timeout);

        println!("🐑 herd runtime constructed (project: {})", config.project_path.display());

        Runtime { config, bus, checkin, store, memory, graph, adapters: AdapterRegistry::new(), sessions }
    }

    /// Starts background tasks (bus pruning is done inline on `read`, so this
    /// currently only starts the session manager's idle sweep).
    pub fn start(&self) {
        self.sessions.start();
    }

    pub fn health(&self) -> serde_json::Value {
        let status = |ok: bool| if ok { "ok" } else { "unavailable" };
        serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "adapters": {
                "store": status(self.adapters.store.is_some()),
                "notify": status(self.adapters.notify.is_some()),
                "tickets": status(self.adapters.tickets.is_some()),
                "repo": status(self.adapters.repo.is_some()),
                "agent": status(self.adapters.agent.is_some()),
            },
            "stores": {
                "operational": "ok",
                "vector": status(self.memory.as_ref().map(|m| m.is_available()).unwrap_or(false)),
                "graph": status(self.graph.as_ref().map(|g| g.is_available()).unwrap_or(false)),
            },
        })
    }
}
