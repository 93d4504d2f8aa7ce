use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::{json, Value};

use crate::adapters::StoreAdapter;
use crate::entities::{
    AgentInstanceRecord, AgentRecord, DecisionRecord, LifecycleEvent, ModelRecord, PullRequestRecord, ReviewFindingRecord,
    ReviewRecord, SprintRecord, TicketEvent, TicketRecord, TokenEvent,
};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(path: &str) -> Self {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path).expect("failed to open operational store");
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .expect("failed to set pragmas");
        let store = SqliteStore { conn: Mutex::new(conn) };
        store.migrate();
        store
    }

    fn migrate(&self) {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS agent_def (
                agent_code TEXT PRIMARY KEY,
                agent_role TEXT NOT NULL,
                agent_status TEXT NOT NULL DEFAULT 'active',
                default_model_code TEXT,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL,
                deleted_at TEXT
            );

            CREATE TABLE IF NOT EXISTS agent_instance (
                agent_instance_code TEXT PRIMARY KEY,
                agent_code TEXT NOT NULL,
                model_code TEXT,
                ticket_code TEXT,
                spawned_by_agent_instance_code TEXT,
                craft_version_code TEXT,
                personality_version_code TEXT,
                started_at TEXT NOT NULL,
                ended_at TEXT
            );

            CREATE TABLE IF NOT EXISTS ticket_def (
                ticket_code TEXT PRIMARY KEY,
                ticket_title TEXT NOT NULL,
                ticket_description TEXT,
                ticket_current_status TEXT NOT NULL DEFAULT 'open',
                project_code TEXT,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL,
                deleted_at TEXT
            );

            CREATE TABLE IF NOT EXISTS pull_request (
                pr_code TEXT PRIMARY KEY,
                ticket_code TEXT,
                pr_url TEXT,
                pr_status TEXT NOT NULL DEFAULT 'open',
                lines_added INTEGER,
                lines_removed INTEGER,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL,
                deleted_at TEXT
            );

            CREATE TABLE IF NOT EXISTS review_def (
                review_code TEXT PRIMARY KEY,
                pr_code TEXT NOT NULL,
                reviewer_agent_instance_code TEXT NOT NULL,
                review_round INTEGER NOT NULL,
                review_verdict TEXT,
                review_duration_minutes REAL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_review_pr ON review_def(pr_code);

            CREATE TABLE IF NOT EXISTS review_finding (
                review_finding_code TEXT PRIMARY KEY,
                review_code TEXT NOT NULL REFERENCES review_def(review_code),
                finding_category TEXT NOT NULL,
                finding_severity TEXT NOT NULL,
                finding_description TEXT NOT NULL,
                finding_file_path TEXT,
                finding_line_number INTEGER,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_finding_review ON review_finding(review_code);

            CREATE TABLE IF NOT EXISTS decision_record (
                decision_id TEXT PRIMARY KEY,
                decision_type TEXT NOT NULL,
                context TEXT,
                decision TEXT NOT NULL,
                rationale TEXT,
                alternatives_considered TEXT,
                decided_by TEXT NOT NULL,
                ticket_code TEXT,
                created_at TEXT NOT NULL,
                deleted_at TEXT
            );

            CREATE TABLE IF NOT EXISTS model_def (
                model_code TEXT PRIMARY KEY,
                model_input_cost_per_m REAL NOT NULL DEFAULT 0,
                model_output_cost_per_m REAL NOT NULL DEFAULT 0,
                model_cache_read_cost_per_m REAL NOT NULL DEFAULT 0,
                model_cache_create_cost_per_m REAL NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS sprint_def (
                sprint_code TEXT PRIMARY KEY,
                sprint_started_at TEXT NOT NULL,
                sprint_ended_at TEXT
            );

            CREATE TABLE IF NOT EXISTS agent_instance_lifecycle_activity (
                agent_instance_code TEXT NOT NULL,
                lifecycle_event_type TEXT NOT NULL,
                lifecycle_detail TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_lifecycle_instance ON agent_instance_lifecycle_activity(agent_instance_code, created_at);

            CREATE TABLE IF NOT EXISTS agent_instance_ticket_activity (
                agent_instance_code TEXT NOT NULL,
                ticket_code TEXT NOT NULL,
                ticket_event_type TEXT NOT NULL,
                ticket_status TEXT,
                ticket_activity_comment TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_ticket_activity_ticket ON agent_instance_ticket_activity(ticket_code, created_at);

            CREATE TABLE IF NOT EXISTS agent_instance_review_activity (
                agent_instance_code TEXT NOT NULL,
                review_code TEXT NOT NULL,
                pr_code TEXT NOT NULL,
                review_event_type TEXT NOT NULL,
                review_activity_detail TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_review_activity_pr ON agent_instance_review_activity(pr_code, created_at);

            CREATE TABLE IF NOT EXISTS agent_instance_token_activity (
                agent_instance_code TEXT NOT NULL,
                model_code TEXT NOT NULL,
                token_input_count INTEGER NOT NULL DEFAULT 0,
                token_output_count INTEGER NOT NULL DEFAULT 0,
                token_cache_read_count INTEGER NOT NULL DEFAULT 0,
                token_cache_create_count INTEGER NOT NULL DEFAULT 0,
                token_cost_usd REAL NOT NULL DEFAULT 0,
                token_context_utilization_pct REAL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_token_activity_instance ON agent_instance_token_activity(agent_instance_code, created_at);
            ",
        )
        .expect("failed to run operational store migrations");

        // Added after the initial release; idempotent per the same pattern as crate::db.
        conn.execute_batch("ALTER TABLE ticket_def ADD COLUMN project_code TEXT;").ok();
    }

    // --- Agents ---

    pub fn save_agent(&self, agent: &AgentRecord) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO agent_def (agent_code, agent_role, agent_status, default_model_code, created_at, modified_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(agent_code) DO UPDATE SET agent_role=excluded.agent_role, agent_status=excluded.agent_status,
                default_model_code=excluded.default_model_code, modified_at=excluded.modified_at, deleted_at=excluded.deleted_at",
            params![
                agent.agent_code, agent.agent_role, agent.agent_status, agent.default_model_code,
                agent.created_at.to_rfc3339(), agent.modified_at.to_rfc3339(), agent.deleted_at.map(|t| t.to_rfc3339())
            ],
        )
        .ok();
    }

    pub fn save_agent_instance(&self, instance: &AgentInstanceRecord) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO agent_instance (agent_instance_code, agent_code, model_code, ticket_code,
                spawned_by_agent_instance_code, craft_version_code, personality_version_code, started_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(agent_instance_code) DO UPDATE SET ended_at=excluded.ended_at",
            params![
                instance.agent_instance_code, instance.agent_code, instance.model_code, instance.ticket_code,
                instance.spawned_by_agent_instance_code, instance.craft_version_code, instance.personality_version_code,
                instance.started_at.to_rfc3339(), instance.ended_at.map(|t| t.to_rfc3339())
            ],
        )
        .ok();
    }

    pub fn end_agent_instance(&self, agent_instance_code: &str) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE agent_instance SET ended_at = ?1 WHERE agent_instance_code = ?2",
            params![chrono::Utc::now().to_rfc3339(), agent_instance_code],
        )
        .ok();
    }

    pub fn get_agent(&self, agent_code: &str) -> Option<AgentRecord> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT agent_code, agent_role, agent_status, default_model_code, created_at, modified_at, deleted_at
             FROM agent_def WHERE agent_code = ?1 AND deleted_at IS NULL",
            [agent_code],
            Self::row_to_agent,
        )
        .ok()
    }

    /// Agents with `agent_status = "running"`, mirroring `list(Agent, state=RUNNING)` (spec §4.5).
    pub fn list_agents(&self, active_only: bool) -> Vec<AgentRecord> {
        let conn = self.conn.lock().unwrap();
        let sql = if active_only {
            "SELECT agent_code, agent_role, agent_status, default_model_code, created_at, modified_at, deleted_at
             FROM agent_def WHERE deleted_at IS NULL AND agent_status = 'running' ORDER BY agent_code"
        } else {
            "SELECT agent_code, agent_role, agent_status, default_model_code, created_at, modified_at, deleted_at
             FROM agent_def WHERE deleted_at IS NULL ORDER BY agent_code"
        };
        let mut stmt = conn.prepare(sql).unwrap();
        stmt.query_map([], Self::row_to_agent).unwrap().filter_map(|r| r.ok()).collect()
    }

    pub fn set_agent_status(&self, agent_code: &str, status: &str) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE agent_def SET agent_status = ?1, modified_at = ?2 WHERE agent_code = ?3",
            params![status, chrono::Utc::now().to_rfc3339(), agent_code],
        )
        .ok();
    }

    /// Running instances of an agent code, most recently started first.
    pub fn running_instances(&self, agent_code: &str) -> Vec<AgentInstanceRecord> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT agent_instance_code, agent_code, model_code, ticket_code, spawned_by_agent_instance_code,
                    craft_version_code, personality_version_code, started_at, ended_at
                 FROM agent_instance WHERE agent_code = ?1 AND ended_at IS NULL ORDER BY started_at DESC",
            )
            .unwrap();
        stmt.query_map([agent_code], Self::row_to_instance).unwrap().filter_map(|r| r.ok()).collect()
    }

    /// The most recently started instance of an agent code, running or not.
    pub fn latest_instance(&self, agent_code: &str) -> Option<AgentInstanceRecord> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT agent_instance_code, agent_code, model_code, ticket_code, spawned_by_agent_instance_code,
                craft_version_code, personality_version_code, started_at, ended_at
             FROM agent_instance WHERE agent_code = ?1 ORDER BY started_at DESC LIMIT 1",
            [agent_code],
            Self::row_to_instance,
        )
        .ok()
    }

    /// The most recently *ended* instance of an agent code — the cutoff point `herd_catchup` measures from.
    pub fn latest_ended_instance(&self, agent_code: &str) -> Option<AgentInstanceRecord> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT agent_instance_code, agent_code, model_code, ticket_code, spawned_by_agent_instance_code,
                craft_version_code, personality_version_code, started_at, ended_at
             FROM agent_instance WHERE agent_code = ?1 AND ended_at IS NOT NULL ORDER BY ended_at DESC LIMIT 1",
            [agent_code],
            Self::row_to_instance,
        )
        .ok()
    }

    fn row_to_agent(row: &rusqlite::Row) -> rusqlite::Result<AgentRecord> {
        Ok(AgentRecord {
            agent_code: row.get(0)?,
            agent_role: row.get(1)?,
            agent_status: row.get(2)?,
            default_model_code: row.get(3)?,
            created_at: parse_ts(row.get::<_, String>(4)?),
            modified_at: parse_ts(row.get::<_, String>(5)?),
            deleted_at: row.get::<_, Option<String>>(6)?.map(parse_ts),
        })
    }

    fn row_to_instance(row: &rusqlite::Row) -> rusqlite::Result<AgentInstanceRecord> {
        Ok(AgentInstanceRecord {
            agent_instance_code: row.get(0)?,
            agent_code: row.get(1)?,
            model_code: row.get(2)?,
            ticket_code: row.get(3)?,
            spawned_by_agent_instance_code: row.get(4)?,
            craft_version_code: row.get(5)?,
            personality_version_code: row.get(6)?,
            started_at: parse_ts(row.get::<_, String>(7)?),
            ended_at: row.get::<_, Option<String>>(8)?.map(parse_ts),
        })
    }

    // --- Tickets ---

    pub fn save_ticket(&self, ticket: &TicketRecord) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO ticket_def (ticket_code, ticket_title, ticket_description, ticket_current_status,
                project_code, created_at, modified_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(ticket_code) DO UPDATE SET ticket_title=excluded.ticket_title,
                ticket_description=excluded.ticket_description, ticket_current_status=excluded.ticket_current_status,
                modified_at=excluded.modified_at, deleted_at=excluded.deleted_at",
            params![
                ticket.ticket_code, ticket.ticket_title, ticket.ticket_description, ticket.ticket_current_status,
                ticket.project_code, ticket.created_at.to_rfc3339(), ticket.modified_at.to_rfc3339(),
                ticket.deleted_at.map(|t| t.to_rfc3339())
            ],
        )
        .ok();
    }

    pub fn get_ticket(&self, ticket_code: &str) -> Option<TicketRecord> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT ticket_code, ticket_title, ticket_description, ticket_current_status, project_code,
                created_at, modified_at, deleted_at
             FROM ticket_def WHERE ticket_code = ?1 AND deleted_at IS NULL",
            [ticket_code],
            |row| {
                Ok(TicketRecord {
                    ticket_code: row.get(0)?,
                    ticket_title: row.get(1)?,
                    ticket_description: row.get(2)?,
                    ticket_current_status: row.get(3)?,
                    project_code: row.get(4)?,
                    created_at: parse_ts(row.get::<_, String>(5)?),
                    modified_at: parse_ts(row.get::<_, String>(6)?),
                    deleted_at: row.get::<_, Option<String>>(7)?.map(parse_ts),
                })
            },
        )
        .ok()
    }

    pub fn soft_delete_ticket(&self, ticket_code: &str) {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE ticket_def SET deleted_at = ?1, modified_at = ?1 WHERE ticket_code = ?2",
            params![now, ticket_code],
        )
        .ok();
    }

    pub fn set_ticket_status(&self, ticket_code: &str, status: &str) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE ticket_def SET ticket_current_status = ?1, modified_at = ?2 WHERE ticket_code = ?3",
            params![status, chrono::Utc::now().to_rfc3339(), ticket_code],
        )
        .ok();
    }

    pub fn append_ticket_event(&self, event: &TicketEvent) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO agent_instance_ticket_activity
                (agent_instance_code, ticket_code, ticket_event_type, ticket_status, ticket_activity_comment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.agent_instance_code, event.ticket_code, event.ticket_event_type, event.ticket_status,
                event.ticket_activity_comment, event.created_at.to_rfc3339()
            ],
        )
        .ok();
    }

    pub fn ticket_events(&self, ticket_code: &str) -> Vec<TicketEvent> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT agent_instance_code, ticket_code, ticket_event_type, ticket_status, ticket_activity_comment, created_at
                 FROM agent_instance_ticket_activity WHERE ticket_code = ?1 ORDER BY created_at ASC",
            )
            .unwrap();
        stmt.query_map([ticket_code], |row| {
            Ok(TicketEvent {
                agent_instance_code: row.get(0)?,
                ticket_code: row.get(1)?,
                ticket_event_type: row.get(2)?,
                ticket_status: row.get(3)?,
                ticket_activity_comment: row.get(4)?,
                created_at: parse_ts(row.get::<_, String>(5)?),
            })
        })
        .unwrap()
        .filter_map(|r| r.ok())
        .collect()
    }

    /// Tickets matching an optional status and/or project code, active (non-deleted) only.
    pub fn list_tickets(&self, status: Option<&str>, project_code: Option<&str>) -> Vec<TicketRecord> {
        let conn = self.conn.lock().unwrap();
        let mut sql = "SELECT ticket_code, ticket_title, ticket_description, ticket_current_status, project_code,
                created_at, modified_at, deleted_at
             FROM ticket_def WHERE deleted_at IS NULL"
            .to_string();
        if status.is_some() {
            sql.push_str(" AND ticket_current_status = ?1");
        }
        if project_code.is_some() {
            sql.push_str(if status.is_some() { " AND project_code = ?2" } else { " AND project_code = ?1" });
        }
        sql.push_str(" ORDER BY created_at DESC");

        let row = |row: &rusqlite::Row| {
            Ok(TicketRecord {
                ticket_code: row.get(0)?,
                ticket_title: row.get(1)?,
                ticket_description: row.get(2)?,
                ticket_current_status: row.get(3)?,
                project_code: row.get(4)?,
                created_at: parse_ts(row.get::<_, String>(5)?),
                modified_at: parse_ts(row.get::<_, String>(6)?),
                deleted_at: row.get::<_, Option<String>>(7)?.map(parse_ts),
            })
        };

        let mut stmt = conn.prepare(&sql).unwrap();
        let rows: Vec<TicketRecord> = match (status, project_code) {
            (Some(s), Some(p)) => stmt.query_map(params![s, p], row).unwrap().filter_map(|r| r.ok()).collect(),
            (Some(s), None) => stmt.query_map(params![s], row).unwrap().filter_map(|r| r.ok()).collect(),
            (None, Some(p)) => stmt.query_map(params![p], row).unwrap().filter_map(|r| r.ok()).collect(),
            (None, None) => stmt.query_map([], row).unwrap().filter_map(|r| r.ok()).collect(),
        };
        rows
    }

    /// Agent instance codes that have worked a ticket, in event order — used
    /// to resolve which instances' token activity counts toward its cost.
    pub fn ticket_instance_codes(&self, ticket_code: &str) -> Vec<String> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT agent_instance_code FROM agent_instance_ticket_activity WHERE ticket_code = ?1",
            )
            .unwrap();
        stmt.query_map([ticket_code], |r| r.get::<_, String>(0)).unwrap().filter_map(|r| r.ok()).collect()
    }

    // --- Pull requests ---

    pub fn save_pull_request(&self, pr: &PullRequestRecord) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO pull_request (pr_code, ticket_code, pr_url, pr_status, lines_added, lines_removed,
                created_at, modified_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(pr_code) DO UPDATE SET pr_url=excluded.pr_url, pr_status=excluded.pr_status,
                lines_added=excluded.lines_added, lines_removed=excluded.lines_removed,
                modified_at=excluded.modified_at, deleted_at=excluded.deleted_at",
            params![
                pr.pr_code, pr.ticket_code, pr.pr_url, pr.pr_status, pr.lines_added, pr.lines_removed,
                pr.created_at.to_rfc3339(), pr.modified_at.to_rfc3339(), pr.deleted_at.map(|t| t.to_rfc3339())
            ],
        )
        .ok();
    }

    pub fn get_pull_request(&self, pr_code: &str) -> Option<PullRequestRecord> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT pr_code, ticket_code, pr_url, pr_status, lines_added, lines_removed, created_at, modified_at, deleted_at
             FROM pull_request WHERE pr_code = ?1 AND deleted_at IS NULL",
            [pr_code],
            |row| {
                Ok(PullRequestRecord {
                    pr_code: row.get(0)?,
                    ticket_code: row.get(1)?,
                    pr_url: row.get(2)?,
                    pr_status: row.get(3)?,
                    lines_added: row.get(4)?,
                    lines_removed: row.get(5)?,
                    created_at: parse_ts(row.get::<_, String>(6)?),
                    modified_at: parse_ts(row.get::<_, String>(7)?),
                    deleted_at: row.get::<_, Option<String>>(8)?.map(parse_ts),
                })
            },
        )
        .ok()
    }

    // --- Reviews ---

    pub fn next_review_round(&self, pr_code: &str) -> i64 {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM review_def WHERE pr_code = ?1", [pr_code], |r| r.get(0))
            .unwrap_or(0);
        count + 1
    }

    pub fn save_review(&self, review: &ReviewRecord) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO review_def (review_code, pr_code, reviewer_agent_instance_code, review_round,
                review_verdict, review_duration_minutes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                review.review_code, review.pr_code, review.reviewer_agent_instance_code, review.review_round,
                review.review_verdict, review.review_duration_minutes, review.created_at.to_rfc3339()
            ],
        )
        .ok();
    }

    pub fn save_review_finding(&self, finding: &ReviewFindingRecord) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO review_finding (review_finding_code, review_code, finding_category, finding_severity,
                finding_description, finding_file_path, finding_line_number, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                finding.review_finding_code, finding.review_code, finding.finding_category, finding.finding_severity,
                finding.finding_description, finding.finding_file_path, finding.finding_line_number,
                finding.created_at.to_rfc3339()
            ],
        )
        .ok();
    }

    pub fn review_findings(&self, review_code: &str) -> Vec<ReviewFindingRecord> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT review_finding_code, review_code, finding_category, finding_severity, finding_description,
                    finding_file_path, finding_line_number, created_at
                 FROM review_finding WHERE review_code = ?1 ORDER BY created_at ASC",
            )
            .unwrap();
        stmt.query_map([review_code], |row| {
            Ok(ReviewFindingRecord {
                review_finding_code: row.get(0)?,
                review_code: row.get(1)?,
                finding_category: row.get(2)?,
                finding_severity: row.get(3)?,
                finding_description: row.get(4)?,
                finding_file_path: row.get(5)?,
                finding_line_number: row.get(6)?,
                created_at: parse_ts(row.get::<_, String>(7)?),
            })
        })
        .unwrap()
        .filter_map(|r| r.ok())
        .collect()
    }

    pub fn reviews_for_pr(&self, pr_code: &str) -> Vec<ReviewRecord> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT review_code, pr_code, reviewer_agent_instance_code, review_round, review_verdict,
                    review_duration_minutes, created_at
                 FROM review_def WHERE pr_code = ?1 ORDER BY review_round ASC",
            )
            .unwrap();
        stmt.query_map([pr_code], |row| {
            Ok(ReviewRecord {
                review_code: row.get(0)?,
                pr_code: row.get(1)?,
                reviewer_agent_instance_code: row.get(2)?,
                review_round: row.get(3)?,
                review_verdict: row.get(4)?,
                review_duration_minutes: row.get(5)?,
                created_at: parse_ts(row.get::<_, String>(6)?),
            })
        })
        .unwrap()
        .filter_map(|r| r.ok())
        .collect()
    }

    pub fn reviews_since(&self, since: chrono::DateTime<chrono::Utc>) -> Vec<ReviewRecord> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT review_code, pr_code, reviewer_agent_instance_code, review_round, review_verdict,
                    review_duration_minutes, created_at
                 FROM review_def WHERE created_at >= ?1 ORDER BY created_at ASC",
            )
            .unwrap();
        stmt.query_map([since.to_rfc3339()], |row| {
            Ok(ReviewRecord {
                review_code: row.get(0)?,
                pr_code: row.get(1)?,
                reviewer_agent_instance_code: row.get(2)?,
                review_round: row.get(3)?,
                review_verdict: row.get(4)?,
                review_duration_minutes: row.get(5)?,
                created_at: parse_ts(row.get::<_, String>(6)?),
            })
        })
        .unwrap()
        .filter_map(|r| r.ok())
        .collect()
    }

    // --- Decisions ---

    pub fn save_decision(&self, decision: &DecisionRecord) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO decision_record (decision_id, decision_type, context, decision, rationale,
                alternatives_considered, decided_by, ticket_code, created_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                decision.decision_id, decision.decision_type, decision.context, decision.decision,
                decision.rationale, decision.alternatives_considered, decision.decided_by, decision.ticket_code,
                decision.created_at.to_rfc3339(), decision.deleted_at.map(|t| t.to_rfc3339())
            ],
        )
        .ok();
    }

    pub fn recent_decisions(&self, since: chrono::DateTime<chrono::Utc>) -> Vec<DecisionRecord> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT decision_id, decision_type, context, decision, rationale, alternatives_considered,
                    decided_by, ticket_code, created_at, deleted_at
                 FROM decision_record WHERE created_at >= ?1 AND deleted_at IS NULL ORDER BY created_at DESC",
            )
            .unwrap();
        stmt.query_map([since.to_rfc3339()], |row| {
            Ok(DecisionRecord {
                decision_id: row.get(0)?,
                decision_type: row.get(1)?,
                context: row.get(2)?,
                decision: row.get(3)?,
                rationale: row.get(4)?,
                alternatives_considered: row.get(5)?,
                decided_by: row.get(6)?,
                ticket_code: row.get(7)?,
                created_at: parse_ts(row.get::<_, String>(8)?),
                deleted_at: row.get::<_, Option<String>>(9)?.map(parse_ts),
            })
        })
        .unwrap()
        .filter_map(|r| r.ok())
        .collect()
    }

    // --- Models ---

    pub fn get_model(&self, model_code: &str) -> ModelRecord {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT model_code, model_input_cost_per_m, model_output_cost_per_m,
                model_cache_read_cost_per_m, model_cache_create_cost_per_m
             FROM model_def WHERE model_code = ?1",
            [model_code],
            |row| {
                Ok(ModelRecord {
                    model_code: row.get(0)?,
                    input_cost_per_m: row.get(1)?,
                    output_cost_per_m: row.get(2)?,
                    cache_read_cost_per_m: row.get(3)?,
                    cache_create_cost_per_m: row.get(4)?,
                })
            },
        )
        .unwrap_or_else(|_| ModelRecord::unknown(model_code))
    }

    pub fn upsert_model(&self, model: &ModelRecord) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO model_def (model_code, model_input_cost_per_m, model_output_cost_per_m,
                model_cache_read_cost_per_m, model_cache_create_cost_per_m)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(model_code) DO UPDATE SET model_input_cost_per_m=excluded.model_input_cost_per_m,
                model_output_cost_per_m=excluded.model_output_cost_per_m,
                model_cache_read_cost_per_m=excluded.model_cache_read_cost_per_m,
                model_cache_create_cost_per_m=excluded.model_cache_create_cost_per_m",
            params![
                model.model_code, model.input_cost_per_m, model.output_cost_per_m,
                model.cache_read_cost_per_m, model.cache_create_cost_per_m
            ],
        )
        .ok();
    }

    // --- Sprints ---

    pub fn save_sprint(&self, sprint: &SprintRecord) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sprint_def (sprint_code, sprint_started_at, sprint_ended_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(sprint_code) DO UPDATE SET sprint_ended_at=excluded.sprint_ended_at",
            params![sprint.sprint_code, sprint.sprint_started_at.to_rfc3339(), sprint.sprint_ended_at.map(|t| t.to_rfc3339())],
        )
        .ok();
    }

    // --- Events ---

    pub fn append_lifecycle_event(&self, event: &LifecycleEvent) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO agent_instance_lifecycle_activity (agent_instance_code, lifecycle_event_type, lifecycle_detail, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![event.agent_instance_code, event.lifecycle_event_type, event.lifecycle_detail, event.created_at.to_rfc3339()],
        )
        .ok();
    }

    /// Most recent lifecycle event timestamp for an instance, if any — used by `stale_agents`.
    pub fn last_lifecycle_event_at(&self, agent_instance_code: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT created_at FROM agent_instance_lifecycle_activity
             WHERE agent_instance_code = ?1 ORDER BY created_at DESC LIMIT 1",
            [agent_instance_code],
            |row| row.get::<_, String>(0),
        )
        .ok()
        .map(parse_ts)
    }

    pub fn token_events_since(&self, since: chrono::DateTime<chrono::Utc>) -> Vec<TokenEvent> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT agent_instance_code, model_code, token_input_count, token_output_count,
                    token_cache_read_count, token_cache_create_count, token_cost_usd,
                    token_context_utilization_pct, created_at
                 FROM agent_instance_token_activity WHERE created_at >= ?1 ORDER BY created_at ASC",
            )
            .unwrap();
        stmt.query_map([since.to_rfc3339()], |row| {
            Ok(TokenEvent {
                agent_instance_code: row.get(0)?,
                model_code: row.get(1)?,
                token_input_count: row.get(2)?,
                token_output_count: row.get(3)?,
                token_cache_read_count: row.get(4)?,
                token_cache_create_count: row.get(5)?,
                token_cost_usd: row.get(6)?,
                token_context_utilization_pct: row.get(7)?,
                created_at: parse_ts(row.get::<_, String>(8)?),
            })
        })
        .unwrap()
        .filter_map(|r| r.ok())
        .collect()
    }

    pub fn token_events_for_instances(&self, instance_codes: &[String]) -> Vec<TokenEvent> {
        if instance_codes.is_empty() {
            return Vec::new();
        }
        let conn = self.conn.lock().unwrap();
        let placeholders = instance_codes.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT agent_instance_code, model_code, token_input_count, token_output_count,
                token_cache_read_count, token_cache_create_count, token_cost_usd,
                token_context_utilization_pct, created_at
             FROM agent_instance_token_activity WHERE agent_instance_code IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql).unwrap();
        let params: Vec<&dyn rusqlite::ToSql> = instance_codes.iter().map(|c| c as &dyn rusqlite::ToSql).collect();
        stmt.query_map(params.as_slice(), |row| {
            Ok(TokenEvent {
                agent_instance_code: row.get(0)?,
                model_code: row.get(1)?,
                token_input_count: row.get(2)?,
                token_output_count: row.get(3)?,
                token_cache_read_count: row.get(4)?,
                token_cache_create_count: row.get(5)?,
                token_cost_usd: row.get(6)?,
                token_context_utilization_pct: row.get(7)?,
                created_at: parse_ts(row.get::<_, String>(8)?),
            })
        })
        .unwrap()
        .filter_map(|r| r.ok())
        .collect()
    }

    pub fn append_review_event(&self, event: &crate::entities::ReviewEvent) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO agent_instance_review_activity
                (agent_instance_code, review_code, pr_code, review_event_type, review_activity_detail, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.agent_instance_code, event.review_code, event.pr_code, event.review_event_type,
                event.review_activity_detail, event.created_at.to_rfc3339()
            ],
        )
        .ok();
    }

    pub fn append_token_event(&self, event: &TokenEvent) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO agent_instance_token_activity
                (agent_instance_code, model_code, token_input_count, token_output_count,
                 token_cache_read_count, token_cache_create_count, token_cost_usd,
                 token_context_utilization_pct, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.agent_instance_code, event.model_code, event.token_input_count, event.token_output_count,
                event.token_cache_read_count, event.token_cache_create_count, event.token_cost_usd,
                event.token_context_utilization_pct, event.created_at.to_rfc3339()
            ],
        )
        .ok();
    }

    pub fn storage_info(&self, path: &str) -> Value {
        let meta = std::fs::metadata(path).ok();
        json!({
            "path": path,
            "size_bytes": meta.as_ref().map(|m| m.len()).unwrap_or(0),
            "last_modified": meta.and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs()),
        })
    }
}

fn parse_ts(s: String) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}

/// Generic `StoreAdapter` facade over the typed methods above, dispatching on
/// `entity_type`/`event_type` string tags. Used when a tool handler is
/// written against the port rather than the concrete store (e.g. when an
/// external `Store` adapter could substitute for this one).
#[async_trait]
impl StoreAdapter for SqliteStore {
    async fn get(&self, entity_type: &str, id: &str) -> Option<Value> {
        match entity_type {
            "ticket" => self.get_ticket(id).and_then(|t| serde_json::to_value(t).ok()),
            "agent" => self.get_agent(id).and_then(|a| serde_json::to_value(a).ok()),
            "pull_request" => self.get_pull_request(id).and_then(|p| serde_json::to_value(p).ok()),
            _ => None,
        }
    }

    async fn list(&self, entity_type: &str, filters: &Value) -> Vec<Value> {
        match entity_type {
            "ticket" => {
                let status = filters.get("status").and_then(|v| v.as_str());
                let project = filters.get("project_code").and_then(|v| v.as_str());
                self.list_tickets(status, project).into_iter().filter_map(|t| serde_json::to_value(t).ok()).collect()
            }
            "agent" => {
                let active_only = filters.get("state").and_then(|v| v.as_str()) == Some("RUNNING")
                    || filters.get("active").and_then(|v| v.as_bool()).unwrap_or(false);
                self.list_agents(active_only).into_iter().filter_map(|a| serde_json::to_value(a).ok()).collect()
            }
            _ => Vec::new(),
        }
    }

    async fn save(&self, entity_type: &str, record: &Value) -> String {
        match entity_type {
            "ticket" => {
                if let Ok(ticket) = serde_json::from_value::<TicketRecord>(record.clone()) {
                    let code = ticket.ticket_code.clone();
                    self.save_ticket(&ticket);
                    code
                } else {
                    String::new()
                }
            }
            "agent" => {
                if let Ok(agent) = serde_json::from_value::<AgentRecord>(record.clone()) {
                    let code = agent.agent_code.clone();
                    self.save_agent(&agent);
                    code
                } else {
                    String::new()
                }
            }
            "pull_request" => {
                if let Ok(pr) = serde_json::from_value::<PullRequestRecord>(record.clone()) {
                    let code = pr.pr_code.clone();
                    self.save_pull_request(&pr);
                    code
                } else {
                    String::new()
                }
            }
            _ => String::new(),
        }
    }

    async fn delete(&self, entity_type: &str, id: &str) {
        match entity_type {
            "ticket" => self.soft_delete_ticket(id),
            "agent" => self.set_agent_status(id, "stopped"),
            _ => {}
        }
    }

    async fn append(&self, event_type: &str, event: &Value) {
        match event_type {
            "ticket" => {
                if let Ok(ev) = serde_json::from_value::<TicketEvent>(event.clone()) {
                    self.append_ticket_event(&ev);
                }
            }
            "lifecycle" => {
                if let Ok(ev) = serde_json::from_value::<LifecycleEvent>(event.clone()) {
                    self.append_lifecycle_event(&ev);
                }
            }
            "token" => {
                if let Ok(ev) = serde_json::from_value::<TokenEvent>(event.clone()) {
                    self.append_token_event(&ev);
                }
            }
            _ => {}
        }
    }

    async fn count(&self, entity_type: &str, _filters: &Value) -> i64 {
        let conn = self.conn.lock().unwrap();
        let table = match entity_type {
            "ticket" => "ticket_def",
            "agent" => "agent_def",
            "pull_request" => "pull_request",
            _ => return 0,
        };
        conn.query_row(&format!("SELECT COUNT(*) FROM {table} WHERE deleted_at IS NULL"), [], |r| r.get(0))
            .unwrap_or(0)
    }

    async fn events(&self, event_type: &str, filters: &Value) -> Vec<Value> {
        match event_type {
            "ticket" => {
                let ticket_code = filters.get("ticket_code").and_then(|v| v.as_str()).unwrap_or_default();
                self.ticket_events(ticket_code).into_iter().filter_map(|e| serde_json::to_value(e).ok()).collect()
            }
            _ => Vec::new(),
        }
    }

    async fn storage_info(&self) -> Value {
        json!({})
    }
}
