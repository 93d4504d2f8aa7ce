//! Static agent tier classification (spec §3.7).
//!
//! Four tiers gate context-pane budget and which message `type`s an agent
//! receives on `herd_checkin` / `herd_get_messages`. Membership is a closed,
//! hardcoded roster — the same roster the original ships, plus the legacy
//! name aliases `herd_assume` has always accepted (see SPEC_FULL §11.5).

use std::collections::HashSet;
use std::sync::LazyLock;

pub const LEADER_AGENTS: [&str; 2] = ["steve", "leonardo"];
pub const SENIOR_AGENTS: [&str; 3] = ["wardenstein", "scribe", "tufte"];
pub const MECHANICAL_AGENTS: [&str; 2] = ["rook", "vigil"];

/// Legacy agent codes that were renamed; resolved to the current code before
/// tier lookup or craft-section extraction.
pub static LEGACY_ALIASES: LazyLock<[(&str, &str); 4]> = LazyLock::new(|| {
    [
        ("grunt", "mason"),
        ("pikasso", "fresco"),
        ("mini-mao", "steve"),
        ("shakesquill", "scribe"),
    ]
});

pub fn resolve_legacy(agent: &str) -> String {
    for (old, new) in LEGACY_ALIASES.iter() {
        if *old == agent {
            return new.to_string();
        }
    }
    agent.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Leader,
    Senior,
    Mechanical,
    Execution,
}

impl Tier {
    pub fn context_budget(self) -> usize {
        match self {
            Tier::Leader => 500,
            Tier::Senior => 300,
            Tier::Mechanical => 0,
            Tier::Execution => 200,
        }
    }

    /// Whether a message of `msg_type` is delivered to callers of this tier.
    pub fn allows_message_type(self, msg_type: &str) -> bool {
        match self {
            Tier::Mechanical => msg_type == "directive",
            _ => matches!(msg_type, "directive" | "inform" | "flag"),
        }
    }
}

pub fn classify(agent: &str) -> Tier {
    let agent = resolve_legacy(agent);
    if LEADER_AGENTS.contains(&agent.as_str()) {
        Tier::Leader
    } else if SENIOR_AGENTS.contains(&agent.as_str()) {
        Tier::Senior
    } else if MECHANICAL_AGENTS.contains(&agent.as_str()) {
        Tier::Mechanical
    } else {
        Tier::Execution
    }
}

pub fn is_mechanical(agent: &str) -> bool {
    classify(agent) == Tier::Mechanical
}

pub fn known_agents() -> HashSet<&'static str> {
    let mut set = HashSet::new();
    set.extend(LEADER_AGENTS);
    set.extend(SENIOR_AGENTS);
    set.extend(MECHANICAL_AGENTS);
    // Execution-tier names are open-ended (anything not in the above sets),
    // so herd_assume's "known agent" check uses a curated roster instead —
    // see tools::assume::KNOWN_AGENTS.
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leader_budget_and_types() {
        assert_eq!(classify("steve"), Tier::Leader);
        assert_eq!(Tier::Leader.context_budget(), 500);
        assert!(Tier::Leader.allows_message_type("flag"));
    }

    #[test]
    fn mechanical_directive_only() {
        assert!(classify("rook") == Tier::Mechanical);
        assert!(Tier::Mechanical.allows_message_type("directive"));
        assert!(!Tier::Mechanical.allows_message_type("inform"));
        assert!(!Tier::Mechanical.allows_message_type("flag"));
    }

    #[test]
    fn legacy_alias_resolves_before_classification() {
        assert_eq!(classify("grunt"), Tier::Execution); // mason isn't special-tiered
        assert_eq!(classify("mini-mao"), Tier::Leader); // mini-mao -> steve
    }

    #[test]
    fn unknown_is_execution() {
        assert_eq!(classify("fresco"), Tier::Execution);
        assert_eq!(Tier::Execution.context_budget(), 200);
    }
}
