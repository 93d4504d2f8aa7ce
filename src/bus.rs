//! In-process message bus with a durable on-disk mirror (spec §4.2).
//!
//! Two tiers: an ordered in-memory hot list for sub-millisecond delivery
//! within a run, and a keyed on-disk mirror (one file per live message) so a
//! restart doesn't lose undelivered mail. All state transitions are
//! serialized on one lock — sends never block readers for longer than the
//! lock hold, and reads are O(n) in queue depth, which is fine at the message
//! volumes a coordination session produces.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::address::{self, Address};
use crate::tiers;

pub const MAX_MESSAGE_AGE: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub from_addr: String,
    pub to_addr: String,
    pub body: String,
    #[serde(rename = "type")]
    pub msg_type: String,
    pub priority: String,
    pub sent_at: DateTime<Utc>,
    /// Reader keys (instance id, or agent code when instance is empty) that
    /// have already consumed an `@everyone` broadcast. Unused for direct and
    /// `@anyone` messages, which are removed outright on first match.
    #[serde(default)]
    pub read_by: Vec<String>,
}

impl Message {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.sent_at).to_std().unwrap_or_default() > MAX_MESSAGE_AGE
    }
}

pub struct MessageBus {
    hot: Mutex<Vec<Message>>,
    mirror_dir: PathBuf,
}

impl MessageBus {
    /// Opens the bus, creating the mirror directory if needed, and rehydrates
    /// the hot list from disk, discarding entries older than one hour and
    /// any entry that fails to parse.
    pub fn new(mirror_dir: impl AsRef<Path>) -> Self {
        let mirror_dir = mirror_dir.as_ref().to_path_buf();
        if let Err(e) = fs::create_dir_all(&mirror_dir) {
            eprintln!("⚠️ bus: failed to create mirror dir {}: {e}", mirror_dir.display());
        }

        let now = Utc::now();
        let mut hot = Vec::new();
        if let Ok(entries) = fs::read_dir(&mirror_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match fs::read_to_string(&path).ok().and_then(|s| serde_json::from_str::<Message>(&s).ok()) {
                    Some(msg) if !msg.is_expired(now) => hot.push(msg),
                    Some(_) => {
                        let _ = fs::remove_file(&path);
                    }
                    None => {
                        eprintln!("⚠️ bus: dropping corrupt mirror entry {}", path.display());
                        let _ = fs::remove_file(&path);
                    }
                }
            }
        }
        hot.sort_by_key(|m| m.sent_at);

        MessageBus { hot: Mutex::new(hot), mirror_dir }
    }

    fn mirror_path(&self, id: &str) -> PathBuf {
        self.mirror_dir.join(format!("{id}.json"))
    }

    fn write_mirror(&self, msg: &Message) {
        let path = self.mirror_path(&msg.id);
        match serde_json::to_string(msg) {
            Ok(json) => {
                if let Err(e) = fs::write(&path, json) {
                    eprintln!("⚠️ bus: mirror write failed for {}: {e} (message kept in memory only)", msg.id);
                }
            }
            Err(e) => eprintln!("⚠️ bus: failed to serialize message {}: {e}", msg.id),
        }
    }

    fn remove_mirror(&self, id: &str) {
        let _ = fs::remove_file(self.mirror_path(id));
    }

    /// Sends a message. Best-effort disk mirror: a write failure is logged
    /// and the message is kept in memory only.
    pub async fn send(&self, from: &str, to: &str, body: &str, msg_type: &str, priority: &str) -> Message {
        let msg = Message {
            id: Uuid::new_v4().to_string(),
            from_addr: from.to_string(),
            to_addr: to.to_string(),
            body: body.to_string(),
            msg_type: msg_type.to_string(),
            priority: priority.to_string(),
            sent_at: Utc::now(),
            read_by: Vec::new(),
        };

        self.write_mirror(&msg);
        let mut hot = self.hot.lock().await;
        hot.push(msg.clone());
        msg
    }

    /// Drains matching messages for `(agent, instance?, team?)`, pruning
    /// expired entries first. See spec §4.2 for the delivery rules.
    pub async fn read(&self, agent: &str, instance: Option<&str>, team: Option<&str>) -> Vec<Message> {
        let mut hot = self.hot.lock().await;
        self.prune_locked(&mut hot);

        let caller = Address {
            agent: agent.to_string(),
            instance: instance.map(str::to_string),
            team: team.map(str::to_string),
        };

        let mut delivered = Vec::new();
        let mut remove_ids = Vec::new();
        let mut anyone_claimed = false;

        for msg in hot.iter_mut() {
            let to = address::parse(&msg.to_addr);

            if to.is_everyone() {
                if let Some(to_team) = &to.team {
                    if caller.team.as_deref() != Some(to_team.as_str()) {
                        continue;
                    }
                }
                let reader_key = reader_key(&caller);
                if msg.read_by.contains(&reader_key) {
                    continue;
                }
                msg.read_by.push(reader_key);
                delivered.push(msg.clone());
                self.write_mirror(msg);
                continue;
            }

            if to.is_anyone() {
                if anyone_claimed {
                    continue;
                }
                if tiers::is_mechanical(&caller.agent) {
                    continue;
                }
                if let Some(to_team) = &to.team {
                    if caller.team.as_deref() != Some(to_team.as_str()) {
                        continue;
                    }
                }
                anyone_claimed = true;
                delivered.push(msg.clone());
                remove_ids.push(msg.id.clone());
                continue;
            }

            if matches_direct(&caller, &to) {
                delivered.push(msg.clone());
                remove_ids.push(msg.id.clone());
            }
        }

        hot.retain(|m| !remove_ids.contains(&m.id));
        for id in &remove_ids {
            self.remove_mirror(id);
        }

        delivered.sort_by_key(|m| m.sent_at);
        delivered
    }

    fn prune_locked(&self, hot: &mut Vec<Message>) {
        let now = Utc::now();
        let mut expired = Vec::new();
        hot.retain(|m| {
            if m.is_expired(now) {
                expired.push(m.id.clone());
                false
            } else {
                true
            }
        });
        for id in &expired {
            self.remove_mirror(id);
        }
    }

    pub fn close(&self) {
        // Mirror entries live on disk as individual files; nothing to flush.
    }
}

fn reader_key(addr: &Address) -> String {
    addr.instance.clone().unwrap_or_else(|| addr.agent.clone())
}

/// Direct-form matching: `name`, `name@team`, `name.inst@team`, plus the
/// leader-visibility override (a leader on a matching team consumes any
/// team-scoped direct message regardless of addressee).
fn matches_direct(caller: &Address, to: &Address) -> bool {
    if to.instance.is_some() {
        return caller.agent == to.agent
            && caller.instance.as_deref() == to.instance.as_deref()
            && caller.team.as_deref() == to.team.as_deref();
    }

    if let Some(to_team) = &to.team {
        let direct_match = caller.agent == to.agent && caller.team.as_deref() == Some(to_team.as_str());
        let leader_override =
            tiers::LEADER_AGENTS.contains(&caller.agent.as_str()) && caller.team.as_deref() == Some(to_team.as_str());
        return direct_match || leader_override;
    }

    caller.agent == to.agent
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn bus() -> (MessageBus, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let bus = MessageBus::new(dir.path());
        (bus, dir)
    }

    #[tokio::test]
    async fn direct_send_and_drain_once() {
        let (bus, _d) = bus();
        bus.send("steve@avalon", "mason", "build DBC-99", "directive", "normal").await;
        let first = bus.read("mason", None, None).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].body, "build DBC-99");
        let second = bus.read("mason", None, None).await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn anyone_excludes_mechanical_and_is_consume_once() {
        let (bus, _d) = bus();
        bus.send("steve", "@anyone", "take this", "directive", "normal").await;
        assert!(bus.read("rook", None, None).await.is_empty());
        let got = bus.read("mason", None, None).await;
        assert_eq!(got.len(), 1);
        assert!(bus.read("fresco", None, None).await.is_empty());
    }

    #[tokio::test]
    async fn everyone_is_once_per_reader_key() {
        let (bus, _d) = bus();
        bus.send("steve", "@everyone", "standup now", "inform", "normal").await;
        assert_eq!(bus.read("mason", Some("inst-m1"), None).await.len(), 1);
        assert!(bus.read("mason", Some("inst-m1"), None).await.is_empty());
        assert_eq!(bus.read("fresco", Some("inst-f1"), None).await.len(), 1);
    }

    #[tokio::test]
    async fn sender_reading_own_everyone_is_not_excluded_by_identity_alone() {
        // read_by is keyed on reader identity, not sender identity; a sender
        // reading as themselves consumes exactly like any other reader.
        let (bus, _d) = bus();
        bus.send("steve", "@everyone", "hi", "inform", "normal").await;
        let got = bus.read("steve", Some("inst-s1"), None).await;
        assert_eq!(got.len(), 1);
        assert!(bus.read("steve", Some("inst-s1"), None).await.is_empty());
    }

    #[tokio::test]
    async fn fifo_order_preserved() {
        let (bus, _d) = bus();
        bus.send("steve", "mason", "one", "inform", "normal").await;
        bus.send("steve", "mason", "two", "inform", "normal").await;
        bus.send("steve", "mason", "three", "inform", "normal").await;
        let got = bus.read("mason", None, None).await;
        let bodies: Vec<_> = got.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn leader_team_scoped_direct_override() {
        let (bus, _d) = bus();
        bus.send("fresco@avalon", "mason@avalon", "ping", "inform", "normal").await;
        let got = bus.read("steve", None, Some("avalon")).await;
        assert_eq!(got.len(), 1, "leader on matching team consumes team-scoped direct mail");
    }

    #[tokio::test]
    async fn empty_bus_returns_empty() {
        let (bus, _d) = bus();
        assert!(bus.read("mason", None, None).await.is_empty());
    }

    #[tokio::test]
    async fn rehydrate_prunes_expired_and_drops_corrupt() {
        let dir = tempdir().unwrap();
        let old = Message {
            id: "old".into(),
            from_addr: "steve".into(),
            to_addr: "mason".into(),
            body: "stale".into(),
            msg_type: "inform".into(),
            priority: "normal".into(),
            sent_at: Utc::now() - chrono::Duration::hours(2),
            read_by: vec![],
        };
        fs::write(dir.path().join("old.json"), serde_json::to_string(&old).unwrap()).unwrap();
        fs::write(dir.path().join("corrupt.json"), "{not json").unwrap();

        let bus = MessageBus::new(dir.path());
        assert!(bus.read("mason", None, None).await.is_empty());
    }
}
