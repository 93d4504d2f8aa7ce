//! Address grammar for the message bus.
//!
//! Seven surface forms collapse to one parsed shape: `name`, `name@team`,
//! `name.inst@team`, `@anyone`, `@anyone@team`, `@everyone`, `@everyone@team`.
//! Parsing is total — there is no invalid address, only ambiguous ones that
//! fall back to a bare agent name with no team.

use std::fmt;

pub const ANYONE: &str = "@anyone";
pub const EVERYONE: &str = "@everyone";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub agent: String,
    pub instance: Option<String>,
    pub team: Option<String>,
}

impl Address {
    pub fn is_broadcast(&self) -> bool {
        self.agent == ANYONE || self.agent == EVERYONE
    }

    pub fn is_anyone(&self) -> bool {
        self.agent == ANYONE
    }

    pub fn is_everyone(&self) -> bool {
        self.agent == EVERYONE
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.agent)?;
        if let Some(inst) = &self.instance {
            write!(f, ".{inst}")?;
        }
        if let Some(team) = &self.team {
            write!(f, "@{team}")?;
        }
        Ok(())
    }
}

/// Parse an address string into `(agent, instance?, team?)`.
///
/// Broadcast tokens (`@anyone`, `@everyone`) begin with `@`; any trailing
/// `@team` on a broadcast token is scope, not a team-delimiter split on the
/// token itself. Non-broadcast forms split on the first `@` to isolate team,
/// then split the remaining local part on the first `.` to isolate instance.
pub fn parse(addr: &str) -> Address {
    let addr = addr.trim();

    if let Some(rest) = addr.strip_prefix(ANYONE) {
        return Address {
            agent: ANYONE.to_string(),
            instance: None,
            team: parse_broadcast_scope(rest),
        };
    }
    if let Some(rest) = addr.strip_prefix(EVERYONE) {
        return Address {
            agent: EVERYONE.to_string(),
            instance: None,
            team: parse_broadcast_scope(rest),
        };
    }

    match addr.split_once('@') {
        Some((local, team)) => {
            let team = if team.is_empty() { None } else { Some(team.to_string()) };
            match local.split_once('.') {
                Some((agent, inst)) if !inst.is_empty() => Address {
                    agent: agent.to_string(),
                    instance: Some(inst.to_string()),
                    team,
                },
                _ => Address {
                    agent: local.to_string(),
                    instance: None,
                    team,
                },
            }
        }
        None => Address {
            agent: addr.to_string(),
            instance: None,
            team: None,
        },
    }
}

fn parse_broadcast_scope(rest: &str) -> Option<String> {
    let rest = rest.strip_prefix('@')?;
    if rest.is_empty() { None } else { Some(rest.to_string()) }
}
