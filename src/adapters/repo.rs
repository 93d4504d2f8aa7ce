//! `Repo` port: source-control operations a spawn/review cycle needs
//! (branch + worktree lifecycle, pushing, PR lifecycle, log tailing).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrRecord {
    pub id: String,
    pub title: String,
    pub url: String,
    pub status: String,
    pub head: String,
    pub base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub author: String,
    pub authored_at: DateTime<Utc>,
    pub subject: String,
}

#[async_trait]
pub trait RepoAdapter: Send + Sync {
    async fn create_branch(&self, name: &str, base: &str) -> Result<String, String>;
    async fn create_worktree(&self, branch: &str, path: &str) -> Result<String, String>;
    async fn remove_worktree(&self, path: &str) -> Result<(), String>;
    async fn push(&self, branch: &str) -> Result<(), String>;
    async fn create_pr(&self, title: &str, body: &str, head: &str, base: &str) -> Result<String, String>;
    async fn get_pr(&self, id: &str) -> Result<PrRecord, String>;
    async fn merge_pr(&self, id: &str) -> Result<(), String>;
    async fn add_pr_comment(&self, id: &str, body: &str) -> Result<(), String>;
    async fn post_review(&self, pr_url: &str, body: &str) -> Result<(), String>;
    async fn get_log(&self, since: Option<DateTime<Utc>>, limit: usize) -> Result<Vec<CommitRecord>, String>;
}
