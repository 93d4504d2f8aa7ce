//! Checkin registry: the heartbeat side of the pull-based protocol (spec §4.3).
//!
//! Every `herd_checkin` call records a heartbeat; `herd_metrics` and
//! `herd_catchup` read staleness off the same map. One lock, one map, keyed by
//! the rendered address string so distinct instances of the same agent code
//! get distinct entries.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::address::{self, Address};

pub const STALE_THRESHOLD: Duration = Duration::from_secs(300);
pub const UNRESPONSIVE_THRESHOLD: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    Stale,
    Unresponsive,
}

#[derive(Debug, Clone)]
pub struct CheckinEntry {
    pub agent: String,
    pub instance: Option<String>,
    pub team: Option<String>,
    pub status: String,
    pub ticket: Option<String>,
    pub last_seen: DateTime<Utc>,
}

impl CheckinEntry {
    fn address(&self) -> Address {
        Address {
            agent: self.agent.clone(),
            instance: self.instance.clone(),
            team: self.team.clone(),
        }
    }

    pub fn staleness_at(&self, now: DateTime<Utc>) -> Staleness {
        let age = now.signed_duration_since(self.last_seen).to_std().unwrap_or_default();
        if age >= UNRESPONSIVE_THRESHOLD {
            Staleness::Unresponsive
        } else if age >= STALE_THRESHOLD {
            Staleness::Stale
        } else {
            Staleness::Fresh
        }
    }
}

pub struct CheckinRegistry {
    entries: Mutex<HashMap<String, CheckinEntry>>,
}

impl Default for CheckinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckinRegistry {
    pub fn new() -> Self {
        println!("💓 checkin registry started");
        CheckinRegistry { entries: Mutex::new(HashMap::new()) }
    }

    /// Records a heartbeat, overwriting any prior entry for the same address.
    pub async fn record(&self, addr: &str, status: &str, ticket: Option<&str>) -> CheckinEntry {
        let parsed = address::parse(addr);
        let entry = CheckinEntry {
            agent: parsed.agent,
            instance: parsed.instance,
            team: parsed.team,
            status: status.to_string(),
            ticket: ticket.map(str::to_string),
            last_seen: Utc::now(),
        };
        let mut entries = self.entries.lock().await;
        entries.insert(addr.to_string(), entry.clone());
        entry
    }

    /// Returns all entries, optionally restricted to a team, ordered by most
    /// recently seen first.
    pub async fn active(&self, team: Option<&str>) -> Vec<CheckinEntry> {
        let entries = self.entries.lock().await;
        let mut out: Vec<CheckinEntry> = entries
            .values()
            .filter(|e| team.is_none_or(|t| e.team.as_deref() == Some(t)))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        out
    }

    pub async fn staleness(&self, addr: &str) -> Option<Staleness> {
        let entries = self.entries.lock().await;
        entries.get(addr).map(|e| e.staleness_at(Utc::now()))
    }

    pub async fn get(&self, addr: &str) -> Option<CheckinEntry> {
        self.entries.lock().await.get(addr).cloned()
    }

    /// Entries that have crossed `UNRESPONSIVE_THRESHOLD`, for metrics/catchup
    /// reporting.
    pub async fn unresponsive(&self) -> Vec<CheckinEntry> {
        let now = Utc::now();
        let entries = self.entries.lock().await;
        entries
            .values()
            .filter(|e| e.staleness_at(now) == Staleness::Unresponsive)
            .cloned()
            .collect()
    }
}

#[allow(dead_code)]
fn address_key(entry: &CheckinEntry) -> String {
    entry.address().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_then_fresh() {
        let reg = CheckinRegistry::new();
        reg.record("mason@avalon", "working", None).await;
        assert_eq!(reg.staleness("mason@avalon").await, Some(Staleness::Fresh));
    }

    #[tokio::test]
    async fn unknown_address_has_no_staleness() {
        let reg = CheckinRegistry::new();
        assert_eq!(reg.staleness("nobody").await, None);
    }

    #[tokio::test]
    async fn active_filters_by_team() {
        let reg = CheckinRegistry::new();
        reg.record("mason@avalon", "working", None).await;
        reg.record("fresco@camelot", "working", None).await;
        let avalon = reg.active(Some("avalon")).await;
        assert_eq!(avalon.len(), 1);
        assert_eq!(avalon[0].agent, "mason");
        assert_eq!(reg.active(None).await.len(), 2);
    }

    #[tokio::test]
    async fn re_record_overwrites_last_seen() {
        let reg = CheckinRegistry::new();
        reg.record("mason", "idle", None).await;
        let first = reg.get("mason").await.unwrap();
        reg.record("mason", "working", None).await;
        let second = reg.get("mason").await.unwrap();
        assert_eq!(second.status, "working");
        assert!(second.last_seen >= first.last_seen);
    }

    #[test]
    fn boundary_thresholds_are_inclusive() {
        let now = Utc::now();
        let entry = CheckinEntry {
            agent: "mason".into(),
            instance: None,
            team: None,
            status: "working".into(),
            ticket: None,
            last_seen: now - chrono::Duration::seconds(300),
        };
        assert_eq!(entry.staleness_at(now), Staleness::Stale);

        let entry2 = CheckinEntry { last_seen: now - chrono::Duration::seconds(600), ..entry };
        assert_eq!(entry2.staleness_at(now), Staleness::Unresponsive);
    }
}
