//! `Notify` port: posting human-facing text to an external channel
//! (Slack in the original). Best-effort by convention — callers log and
//! continue on `Err`, never propagate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResult {
    pub message_id: String,
    pub channel: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub user: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait NotifyAdapter: Send + Sync {
    async fn post(&self, message: &str, channel: Option<&str>, username: Option<&str>, icon: Option<&str>) -> Result<PostResult, String>;
    async fn post_thread(&self, thread_id: &str, message: &str, channel: Option<&str>) -> Result<PostResult, String>;
    async fn get_thread_replies(&self, channel: &str, thread_id: &str) -> Result<Vec<ThreadMessage>, String>;
}
