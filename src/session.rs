//! Session Manager: a thread-id keyed pool of chat-triggered coordinator
//! sessions (spec §4.9). Each inbound chat message spawns a short-lived
//! `claude` CLI invocation — `-p <message> --output-format stream-json`, or
//! `--resume <session_id>` for a follow-up — and the manager's job is
//! bookkeeping: which thread maps to which upstream session id, idle
//! eviction, and not starting two invocations for the same thread at once.

use std::collections::{HashMap, HashSet};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::sleep;

pub const SHUTDOWN_PHRASES: [&str; 5] = ["go to sleep", "stand down", "standdown", "terminate", "shutdown"];
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(180);
const GRACEFUL_KILL_WAIT: Duration = Duration::from_secs(5);
const IDLE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct Session {
    claude_session_id: Option<String>,
    last_activity: DateTime<Utc>,
}

pub struct SessionManager {
    sessions: Mutex<HashMap<String, Session>>,
    pending: Mutex<HashSet<String>>,
    system_prompt: String,
    idle_timeout: Duration,
}

impl SessionManager {
    pub fn new(system_prompt: String, idle_timeout: Duration) -> Arc<Self> {
        Arc::new(SessionManager { sessions: Mutex::new(HashMap::new()), pending: Mutex::new(HashSet::new()), system_prompt, idle_timeout })
    }

    /// Spawns the idle-eviction background task. Mirrors the teacher's
    /// fairing-attached background tasks: one `println!` on start, silent
    /// thereafter unless there's something to evict.
    pub fn start(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            println!("🕰️  session manager idle sweep started ({}s timeout)", manager.idle_timeout.as_secs());
            loop {
                sleep(IDLE_SWEEP_INTERVAL).await;
                manager.evict_idle().await;
            }
        });
    }

    async fn evict_idle(&self) {
        let now = Utc::now();
        let idle: Vec<String> = {
            let sessions = self.sessions.lock().await;
            sessions
                .iter()
                .filter(|(_, s)| now.signed_duration_since(s.last_activity).to_std().unwrap_or_default() > self.idle_timeout)
                .map(|(id, _)| id.clone())
                .collect()
        };
        for thread_id in idle {
            println!("🕰️  evicting idle session for thread {thread_id}");
            self.close_session(&thread_id).await;
        }
    }

    /// `true` if `text` (case-insensitively, trimmed) is a recognized
    /// shutdown phrase.
    pub fn is_shutdown_phrase(text: &str) -> bool {
        let normalized = text.trim().to_lowercase();
        SHUTDOWN_PHRASES.contains(&normalized.as_str())
    }

    pub async fn send_message(&self, thread_id: &str, text: &str, user_name: &str) -> Result<String, String> {
        if Self::is_shutdown_phrase(text) {
            self.close_session(thread_id).await;
            return Ok("Session ended. Standing down.".to_string());
        }

        let existing_session_id = {
            let sessions = self.sessions.lock().await;
            sessions.get(thread_id).and_then(|s| s.claude_session_id.clone())
        };

        let reply = if let Some(session_id) = existing_session_id {
            self.invoke_claude(text, user_name, Some(&session_id)).await
        } else {
            self.create_or_await_session(thread_id, text, user_name).await
        }?;

        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get_mut(thread_id) {
            session.last_activity = Utc::now();
        }
        Ok(reply)
    }

    async fn create_or_await_session(&self, thread_id: &str, text: &str, user_name: &str) -> Result<String, String> {
        let became_owner = {
            let mut pending = self.pending.lock().await;
            if pending.contains(thread_id) {
                false
            } else {
                pending.insert(thread_id.to_string());
                true
            }
        };

        if !became_owner {
            // Another call is already creating this thread's session; poll
            // until it lands rather than racing a second `claude` invocation.
            loop {
                sleep(Duration::from_millis(200)).await;
                let pending_still = self.pending.lock().await.contains(thread_id);
                if !pending_still {
                    break;
                }
            }
            let sessions = self.sessions.lock().await;
            let session_id = sessions.get(thread_id).and_then(|s| s.claude_session_id.clone());
            drop(sessions);
            return self.invoke_claude(text, user_name, session_id.as_deref()).await;
        }

        let (reply, session_id) = self.invoke_claude_capturing_session(text, user_name).await?;
        self.sessions
            .lock()
            .await
            .insert(thread_id.to_string(), Session { claude_session_id: session_id, last_activity: Utc::now() });
        self.pending.lock().await.remove(thread_id);
        Ok(reply)
    }

    async fn invoke_claude(&self, text: &str, user_name: &str, resume: Option<&str>) -> Result<String, String> {
        let (reply, _) = self.spawn_claude(text, user_name, resume).await?;
        Ok(reply)
    }

    async fn invoke_claude_capturing_session(&self, text: &str, user_name: &str) -> Result<(String, Option<String>), String> {
        self.spawn_claude(text, user_name, None).await
    }

    /// Runs `claude -p <message> --verbose --system-prompt <prompt>
    /// --output-format stream-json [--resume <id>]`, strips `CLAUDECODE`
    /// from the child environment, and parses the streamed JSON lines for
    /// `session_id` and the final `result` text.
    async fn spawn_claude(&self, text: &str, user_name: &str, resume: Option<&str>) -> Result<(String, Option<String>), String> {
        let message = format!("[{user_name}]: {text}");
        let mut cmd = Command::new("claude");
        cmd.arg("-p")
            .arg(&message)
            .arg("--verbose")
            .arg("--system-prompt")
            .arg(&self.system_prompt)
            .arg("--output-format")
            .arg("stream-json")
            .env_remove("CLAUDECODE")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(id) = resume {
            cmd.arg("--resume").arg(id);
        }

        let mut child: Child = cmd.spawn().map_err(|e| format!("failed to spawn claude: {e}"))?;
        let stdout = child.stdout.take().ok_or("claude produced no stdout")?;
        let mut lines = BufReader::new(stdout).lines();

        let mut session_id = None;
        let mut result_text = String::new();

        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(value) = serde_json::from_str::<serde_json::Value>(&line) else { continue };
            if let Some(id) = value.get("session_id").and_then(|v| v.as_str()) {
                session_id = Some(id.to_string());
            }
            if let Some(result) = value.get("result").and_then(|v| v.as_str()) {
                result_text = result.to_string();
            }
        }

        let status = child.wait().await.map_err(|e| e.to_string())?;
        if !status.success() && result_text.is_empty() {
            return Err(format!("claude exited with {status}"));
        }

        Ok((result_text, session_id))
    }

    /// Removes bookkeeping for a thread. If called while the owning
    /// `spawn_claude` invocation is still the pending-set holder, waits up to
    /// `GRACEFUL_KILL_WAIT` for it to finish on its own before the caller can
    /// safely reuse the thread id — the subprocess itself is short-lived and
    /// exits on its own once it streams a result, so there is nothing to
    /// force-kill in the common case.
    pub async fn close_session(&self, thread_id: &str) {
        self.sessions.lock().await.remove(thread_id);
        let mut waited = Duration::ZERO;
        while self.pending.lock().await.contains(thread_id) && waited < GRACEFUL_KILL_WAIT {
            sleep(Duration::from_millis(200)).await;
            waited += Duration::from_millis(200);
        }
        self.pending.lock().await.remove(thread_id);
    }

    pub async fn close_all(&self) {
        let thread_ids: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        for id in thread_ids {
            self.close_session(&id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_all_shutdown_phrases() {
        for phrase in SHUTDOWN_PHRASES {
            assert!(SessionManager::is_shutdown_phrase(phrase));
            assert!(SessionManager::is_shutdown_phrase(&phrase.to_uppercase()));
        }
        assert!(!SessionManager::is_shutdown_phrase("keep going"));
    }

    #[tokio::test]
    async fn close_session_on_unknown_thread_is_a_no_op() {
        let manager = SessionManager::new("you are mini-mao".to_string(), DEFAULT_IDLE_TIMEOUT);
        manager.close_session("thread-unknown").await;
    }

    #[tokio::test]
    async fn shutdown_phrase_short_circuits_without_spawning_claude() {
        let manager = SessionManager::new("you are mini-mao".to_string(), DEFAULT_IDLE_TIMEOUT);
        let reply = manager.send_message("thread-1", "stand down", "steve").await.unwrap();
        assert!(reply.to_lowercase().contains("standing down") || reply.to_lowercase().contains("session ended"));
    }
}
