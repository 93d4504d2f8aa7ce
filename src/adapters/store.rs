//! `Store` port: entity/event persistence, independent of any particular
//! tracker or graph. The in-crate `SqliteStore` (see `crate::store`) is the
//! only implementation; this trait exists so tool handlers depend on the
//! seam, not the concrete type.

use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait StoreAdapter: Send + Sync {
    async fn get(&self, entity_type: &str, id: &str) -> Option<Value>;
    async fn list(&self, entity_type: &str, filters: &Value) -> Vec<Value>;
    async fn save(&self, entity_type: &str, record: &Value) -> String;
    async fn delete(&self, entity_type: &str, id: &str);
    async fn append(&self, event_type: &str, event: &Value);
    async fn count(&self, entity_type: &str, filters: &Value) -> i64;
    async fn events(&self, event_type: &str, filters: &Value) -> Vec<Value>;
    async fn storage_info(&self) -> Value;
}
