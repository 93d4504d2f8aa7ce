//! Runtime configuration, read once at process start (spec §6.3).
//!
//! Mirrors `RateLimitConfig::from_env`'s shape: a `Default` with the
//! documented fallbacks, and `from_env()` overlaying whatever the process
//! environment actually sets.

use std::env;
use std::path::PathBuf;

/// Environment variables:
/// - `HERD_PROJECT_PATH` — project root all relative store paths resolve under (default: `.`)
/// - `HERD_API_HOST` — RPC bind host (default: `127.0.0.1`)
/// - `HERD_API_PORT` — RPC bind port (default: `8700`)
/// - `HERD_API_TOKEN` — bearer token required on every RPC call (default: none, auth disabled)
/// - `HERD_AGENT_NAME` — fallback agent code for identity resolution
/// - `HERD_INSTANCE_ID` — fallback instance id for identity resolution
/// - `HERD_TEAM` — fallback team for identity resolution
/// - `HERD_ORG` — fallback org for identity resolution
/// - `HERD_HOST` — fallback host label for identity resolution
/// - `HERD_IDLE_TIMEOUT` — session manager idle-eviction timeout, seconds (default: 180)
/// - `HERD_DB_PATH` — operational store file (default: `<project>/.herd/herd.db`)
/// - `HERD_MEMORY_PATH` — semantic memory store file (default: `<project>/.herd/memory.db`)
/// - `HERD_GRAPH_PATH` — structural graph store file (default: `<project>/.herd/graph.db`)
/// - `HERD_BUS_PATH` — message bus mirror directory (default: `<project>/data/messages`)
pub struct RuntimeConfig {
    pub project_path: PathBuf,
    pub api_host: String,
    pub api_port: u16,
    pub api_token: Option<String>,
    pub agent_name: Option<String>,
    pub instance_id: Option<String>,
    pub team: Option<String>,
    pub org: Option<String>,
    pub host: Option<String>,
    pub idle_timeout_secs: u64,
    pub db_path: PathBuf,
    pub memory_path: PathBuf,
    pub graph_path: PathBuf,
    pub bus_path: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let project_path = PathBuf::from(".");
        RuntimeConfig {
            db_path: project_path.join(".herd").join("herd.db"),
            memory_path: project_path.join(".herd").join("memory.db"),
            graph_path: project_path.join(".herd").join("graph.db"),
            bus_path: project_path.join("data").join("messages"),
            project_path,
            api_host: "127.0.0.1".to_string(),
            api_port: 8700,
            api_token: None,
            agent_name: None,
            instance_id: None,
            team: None,
            org: None,
            host: None,
            idle_timeout_secs: 180,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("HERD_PROJECT_PATH") {
            config.project_path = PathBuf::from(val);
        }

        config.db_path = env::var("HERD_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config.project_path.join(".herd").join("herd.db"));
        config.memory_path = env::var("HERD_MEMORY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config.project_path.join(".herd").join("memory.db"));
        config.graph_path = env::var("HERD_GRAPH_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config.project_path.join(".herd").join("graph.db"));
        config.bus_path = env::var("HERD_BUS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config.project_path.join("data").join("messages"));

        if let Ok(val) = env::var("HERD_API_HOST") {
            config.api_host = val;
        }
        if let Ok(val) = env::var("HERD_API_PORT")
            && let Ok(n) = val.parse::<u16>()
        {
            config.api_port = n;
        }
        config.api_token = env::var("HERD_API_TOKEN").ok();
        config.agent_name = env::var("HERD_AGENT_NAME").ok();
        config.instance_id = env::var("HERD_INSTANCE_ID").ok();
        config.team = env::var("HERD_TEAM").ok();
        config.org = env::var("HERD_ORG").ok();
        config.host = env::var("HERD_HOST").ok();

        if let Ok(val) = env::var("HERD_IDLE_TIMEOUT")
            && let Ok(n) = val.parse::<u64>()
        {
            config.idle_timeout_secs = n;
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_relative_to_dot() {
        let c = RuntimeConfig::default();
        assert_eq!(c.project_path, PathBuf::from("."));
        assert_eq!(c.api_port, 8700);
        assert_eq!(c.idle_timeout_secs, 180);
        assert!(c.api_token.is_none());
    }
}
