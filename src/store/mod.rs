//! Operational store (spec §4.5): entities with soft delete, append-only
//! events, backed by rusqlite the way `Db` in `crate::db` is, with the same
//! idempotent-migration idiom (`CREATE TABLE IF NOT EXISTS` + `ALTER TABLE
//! ... ADD COLUMN` swallowed via `.ok()`).

pub mod queries;
pub mod sqlite;

pub use queries::OperationalQueries;
pub use sqlite::SqliteStore;
