//! Adapter ports (spec §4.4): duck-typed external-collaborator interfaces in
//! the original become traits here. Concrete Slack/Linear/GitHub/filesystem
//! implementations are out of scope (spec §1 Non-goals name external
//! collaborators); only the seams and a registry to hold them are built.

pub mod agent;
pub mod notify;
pub mod repo;
pub mod store;
pub mod tickets;

pub use agent::AgentAdapter;
pub use notify::NotifyAdapter;
pub use repo::RepoAdapter;
pub use store::StoreAdapter;
pub use tickets::TicketsAdapter;

use tokio::sync::Mutex;

/// Holds whichever adapters are configured; every field is optional so a
/// runtime with no external integrations still boots. `write_lock` is the
/// single lock a tool handler takes before a compound write that touches more
/// than one adapter, per spec §5/§9 — adapters are not independently locked.
#[derive(Default)]
pub struct AdapterRegistry {
    pub notify: Option<Box<dyn NotifyAdapter>>,
    pub tickets: Option<Box<dyn TicketsAdapter>>,
    pub repo: Option<Box<dyn RepoAdapter>>,
    pub agent: Option<Box<dyn AgentAdapter>>,
    pub store: Option<Box<dyn StoreAdapter>>,
    pub write_lock: Mutex<()>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        AdapterRegistry::default()
    }
}
