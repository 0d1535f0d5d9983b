//! Schema migrations
//!
//! Each step runs in its own transaction together with the `schema_version`
//! row that records it, so a failed step leaves the previous version intact.

use rusqlite::{params, Connection};

/// Ordered schema steps
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "items with SM-2 state, sessions, attempt log",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        description: "queue and history indexes",
        sql: SCHEMA_V2,
    },
];

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

const VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
)";

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL DEFAULT 'word',
    content TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,

    -- SM-2 state; next_due NULL means never reviewed
    ease REAL NOT NULL DEFAULT 2.5,
    interval_days INTEGER NOT NULL DEFAULT 0,
    repetitions INTEGER NOT NULL DEFAULT 0,
    next_due TEXT,
    last_result INTEGER
);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    mode TEXT NOT NULL,
    state TEXT NOT NULL,
    topics TEXT NOT NULL DEFAULT '[]',
    items TEXT NOT NULL DEFAULT '[]',
    cursor INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    ended_at TEXT
);

-- Append-only; session_id NULL for attempts logged outside a session
CREATE TABLE IF NOT EXISTS attempts (
    id TEXT PRIMARY KEY,
    session_id TEXT,
    item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    item_kind TEXT NOT NULL,
    response TEXT NOT NULL DEFAULT '',
    correct INTEGER NOT NULL,
    latency_ms INTEGER NOT NULL DEFAULT 0,
    recorded_at TEXT NOT NULL
);
"#;

const SCHEMA_V2: &str = r#"
CREATE INDEX IF NOT EXISTS idx_items_next_due ON items(next_due);
CREATE INDEX IF NOT EXISTS idx_items_created_at ON items(created_at);
CREATE INDEX IF NOT EXISTS idx_attempts_item ON attempts(item_id, recorded_at);
CREATE INDEX IF NOT EXISTS idx_attempts_session ON attempts(session_id, recorded_at);
CREATE INDEX IF NOT EXISTS idx_sessions_state ON sessions(state);
"#;

/// Highest applied version, 0 for a fresh database
pub fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.execute_batch(VERSION_TABLE)?;
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
}

/// Bring the schema up to date; returns how many steps ran
pub fn apply_migrations(conn: &Connection) -> rusqlite::Result<u32> {
    let from = schema_version(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > from).collect();

    for step in &pending {
        tracing::info!(version = step.version, "Migrating schema: {}", step.description);
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(step.sql)?;
        tx.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
            params![step.version],
        )?;
        tx.commit()?;
    }

    Ok(pending.len() as u32)
}
