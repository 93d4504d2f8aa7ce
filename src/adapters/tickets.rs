//! `Tickets` port: the external issue tracker a ticket mirrors into.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResult {
    pub previous_status: String,
    pub new_status: String,
    pub event_type: String,
    pub elapsed_minutes: Option<f64>,
}

#[async_trait]
pub trait TicketsAdapter: Send + Sync {
    async fn get(&self, ticket_code: &str) -> Option<Value>;
    async fn create(&self, title: &str, description: Option<&str>, priority: i64, labels: &[String]) -> Result<String, String>;
    async fn update(&self, ticket_code: &str, fields: &Value) -> Result<(), String>;
    async fn transition(
        &self,
        ticket_code: &str,
        to_status: &str,
        note: Option<&str>,
        blocked_by: Option<&str>,
    ) -> Result<TransitionResult, String>;
    async fn add_comment(&self, ticket_code: &str, body: &str) -> Result<(), String>;
    async fn list(&self, filters: &Value) -> Result<Vec<Value>, String>;
}
