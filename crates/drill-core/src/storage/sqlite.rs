//! SQLite Storage Implementation
//!
//! Items, retention state, attempts and session records in one database file.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use directories::ProjectDirs;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

use super::adapter::ItemStore;
use crate::item::{normalize_tags, Candidate, Item, ItemKind, NewItem};
use crate::retention::{RetentionState, DEFAULT_EASE};
use crate::session::{Attempt, AttemptTotals, Session, SessionItem, SessionMode, SessionState};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Item not found
    #[error("Item not found: {0}")]
    NotFound(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid timestamp
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// JSON column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
    /// Backend temporarily unreachable
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Unavailable(_) => true,
            StorageError::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Fixed-width UTC timestamps so text ordering matches time ordering
fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

// ============================================================================
// STORAGE
// ============================================================================

/// SQLite item store
///
/// Uses separate reader/writer connections for interior mutability.
/// All methods take `&self`, making Storage `Send + Sync` so callers can
/// share an `Arc<Storage>`.
pub struct Storage {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    initial_ease: f64,
}

impl Storage {
    /// Apply PRAGMAs and optional encryption to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        #[cfg(feature = "encryption")]
        {
            if let Ok(key) = std::env::var("DRILL_ENCRYPTION_KEY") {
                if !key.is_empty() {
                    conn.pragma_update(None, "key", &key)?;
                }
            }
        }

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -16000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        Ok(())
    }

    /// Default database location under the platform data directory
    pub fn default_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "drill", "core").ok_or_else(|| {
            StorageError::Init("Could not determine project directories".to_string())
        })?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;
        // Owner-only on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            let _ = std::fs::set_permissions(data_dir, perms);
        }
        Ok(data_dir.join("drill.db"))
    }

    /// Open (or create) the database and bring its schema up to date
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => {
                if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                p
            }
            None => Self::default_path()?,
        };

        let writer_conn = Connection::open(&path)?;

        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&path, perms);
        }

        Self::configure_connection(&writer_conn)?;

        // Migrations run on the writer only
        let applied = super::migrations::apply_migrations(&writer_conn)?;
        if applied > 0 {
            tracing::debug!(applied, path = %path.display(), "Database schema updated");
        }

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            initial_ease: DEFAULT_EASE,
        })
    }

    /// Ease given to items added from now on
    pub fn with_initial_ease(mut self, initial_ease: f64) -> Self {
        self.initial_ease = initial_ease;
        self
    }

    fn reader(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))
    }

    fn writer(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StorageError::Init("Writer lock poisoned".into()))
    }

    // ========================================================================
    // ITEMS
    // ========================================================================

    /// Register a new item with a fresh retention state
    pub fn add_item(&self, input: NewItem) -> Result<Item> {
        let item = Item {
            id: Uuid::new_v4().to_string(),
            kind: input.kind,
            content: input.content,
            tags: normalize_tags(&input.tags),
            // Stored at microsecond precision
            created_at: Utc::now().trunc_subsecs(6),
        };

        let content = serde_json::to_string(&item.content)?;
        let tags = serde_json::to_string(&item.tags)?;

        let writer = self.writer()?;
        writer.execute(
            "INSERT INTO items (id, kind, content, tags, created_at, ease)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                item.id,
                item.kind.as_str(),
                content,
                tags,
                format_timestamp(item.created_at),
                self.initial_ease
            ],
        )?;

        tracing::debug!(item_id = %item.id, kind = %item.kind, "Item added");
        Ok(item)
    }

    /// Get an item by ID
    pub fn get_item(&self, id: &str) -> Result<Option<Item>> {
        Ok(self.load_candidate(id)?.map(|c| c.item))
    }

    /// Items with their retention state, in creation order
    pub fn list_items(&self, limit: usize, offset: usize) -> Result<Vec<Candidate>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT * FROM items ORDER BY created_at ASC, id ASC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], Self::row_to_candidate)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete an item and its attempts. Returns false if it did not exist.
    pub fn delete_item(&self, id: &str) -> Result<bool> {
        let writer = self.writer()?;
        let rows = writer.execute("DELETE FROM items WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Number of registered items
    pub fn count_items(&self) -> Result<usize> {
        let reader = self.reader()?;
        let total: i64 = reader.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(total as usize)
    }

    /// Most recent attempts on one item, newest first
    pub fn item_attempts(&self, item_id: &str, limit: usize) -> Result<Vec<Attempt>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(
            "SELECT * FROM attempts WHERE item_id = ?1
             ORDER BY recorded_at DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![item_id, limit as i64], Self::row_to_attempt)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ========================================================================
    // ROW MAPPING
    // ========================================================================

    /// Parse RFC3339 timestamp
    fn parse_timestamp(value: &str, field_name: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                conversion_error(format!("Invalid {} timestamp '{}': {}", field_name, value, e))
            })
    }

    fn parse_json<T: serde::de::DeserializeOwned>(value: &str, field_name: &str) -> rusqlite::Result<T> {
        serde_json::from_str(value)
            .map_err(|e| conversion_error(format!("Invalid {} JSON: {}", field_name, e)))
    }

    fn row_to_candidate(row: &rusqlite::Row) -> rusqlite::Result<Candidate> {
        let kind: String = row.get("kind")?;
        let content: String = row.get("content")?;
        let tags: String = row.get("tags")?;
        let created_at: String = row.get("created_at")?;
        let next_due: Option<String> = row.get("next_due")?;

        let item = Item {
            id: row.get("id")?,
            kind: kind.parse::<ItemKind>().map_err(conversion_error)?,
            content: Self::parse_json(&content, "content")?,
            tags: Self::parse_json(&tags, "tags")?,
            created_at: Self::parse_timestamp(&created_at, "created_at")?,
        };

        let state = RetentionState {
            ease: row.get("ease")?,
            interval_days: row.get("interval_days")?,
            repetitions: row.get("repetitions")?,
            next_due: next_due
                .map(|s| Self::parse_timestamp(&s, "next_due"))
                .transpose()?,
            last_result: row.get("last_result")?,
        };

        Ok(Candidate::new(item, state))
    }

    fn row_to_attempt(row: &rusqlite::Row) -> rusqlite::Result<Attempt> {
        let kind: String = row.get("item_kind")?;
        let recorded_at: String = row.get("recorded_at")?;
        let latency_ms: i64 = row.get("latency_ms")?;

        Ok(Attempt {
            id: row.get("id")?,
            session_id: row.get("session_id")?,
            item_id: row.get("item_id")?,
            item_kind: kind.parse::<ItemKind>().map_err(conversion_error)?,
            response: row.get("response")?,
            correct: row.get("correct")?,
            latency_ms: latency_ms.max(0) as u64,
            recorded_at: Self::parse_timestamp(&recorded_at, "recorded_at")?,
        })
    }

    /// Session row without its attempt history
    fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
        let mode: String = row.get("mode")?;
        let state: String = row.get("state")?;
        let topics: String = row.get("topics")?;
        let items: String = row.get("items")?;
        let cursor: i64 = row.get("cursor")?;
        let created_at: String = row.get("created_at")?;
        let ended_at: Option<String> = row.get("ended_at")?;

        Ok(Session {
            id: row.get("id")?,
            mode: mode.parse::<SessionMode>().map_err(conversion_error)?,
            topics: Self::parse_json(&topics, "topics")?,
            items: Self::parse_json::<Vec<SessionItem>>(&items, "items")?,
            cursor: cursor.max(0) as usize,
            state: state.parse::<SessionState>().map_err(conversion_error)?,
            created_at: Self::parse_timestamp(&created_at, "created_at")?,
            ended_at: ended_at
                .map(|s| Self::parse_timestamp(&s, "ended_at"))
                .transpose()?,
            history: Vec::new(),
        })
    }

    fn write_retention(conn: &Connection, item_id: &str, state: &RetentionState) -> Result<()> {
        let rows = conn.execute(
            "UPDATE items SET ease = ?1, interval_days = ?2, repetitions = ?3,
                 next_due = ?4, last_result = ?5
             WHERE id = ?6",
            params![
                state.ease,
                state.interval_days,
                state.repetitions,
                state.next_due.map(format_timestamp),
                state.last_result,
                item_id
            ],
        )?;
        if rows == 0 {
            return Err(StorageError::NotFound(item_id.to_string()));
        }
        Ok(())
    }
}

impl ItemStore for Storage {
    fn fetch_candidates(&self, topics: &[String]) -> Result<Vec<Candidate>> {
        let reader = self.reader()?;

        if topics.is_empty() {
            let mut stmt = reader.prepare("SELECT * FROM items")?;
            let rows = stmt.query_map([], Self::row_to_candidate)?;
            return Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?);
        }

        let placeholders = vec!["?"; topics.len()].join(", ");
        let sql = format!(
            "SELECT * FROM items WHERE EXISTS (
                 SELECT 1 FROM json_each(items.tags) WHERE json_each.value IN ({})
             )",
            placeholders
        );
        let mut stmt = reader.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(topics.iter()), Self::row_to_candidate)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn load_candidate(&self, item_id: &str) -> Result<Option<Candidate>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare("SELECT * FROM items WHERE id = ?1")?;
        let candidate = stmt
            .query_row(params![item_id], Self::row_to_candidate)
            .optional()?;
        Ok(candidate)
    }

    fn save_retention_state(&self, item_id: &str, state: &RetentionState) -> Result<()> {
        let writer = self.writer()?;
        Self::write_retention(&writer, item_id, state)
    }

    fn commit_attempt(&self, attempt: &Attempt, retention: Option<&RetentionState>) -> Result<()> {
        let mut writer = self.writer()?;
        let tx = writer.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM items WHERE id = ?1)",
            params![attempt.item_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StorageError::NotFound(attempt.item_id.clone()));
        }

        tx.execute(
            "INSERT INTO attempts (id, session_id, item_id, item_kind, response, correct,
                 latency_ms, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                attempt.id,
                attempt.session_id,
                attempt.item_id,
                attempt.item_kind.as_str(),
                attempt.response,
                attempt.correct,
                i64::try_from(attempt.latency_ms).unwrap_or(i64::MAX),
                format_timestamp(attempt.recorded_at)
            ],
        )?;

        if let Some(state) = retention {
            Self::write_retention(&tx, &attempt.item_id, state)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn attempt_totals(&self) -> Result<AttemptTotals> {
        let reader = self.reader()?;
        let (total, correct): (i64, i64) = reader.query_row(
            "SELECT COUNT(*), COALESCE(SUM(correct), 0) FROM attempts",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(AttemptTotals {
            total: total as u64,
            correct: correct as u64,
        })
    }

    fn save_session(&self, session: &Session) -> Result<()> {
        let topics = serde_json::to_string(&session.topics)?;
        let items = serde_json::to_string(&session.items)?;

        let writer = self.writer()?;
        writer.execute(
            "INSERT OR REPLACE INTO sessions (id, mode, state, topics, items, cursor,
                 created_at, ended_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session.id,
                session.mode.as_str(),
                session.state.as_str(),
                topics,
                items,
                session.cursor as i64,
                format_timestamp(session.created_at),
                session.ended_at.map(format_timestamp)
            ],
        )?;
        Ok(())
    }

    fn load_session(&self, session_id: &str) -> Result<Option<Session>> {
        let reader = self.reader()?;
        let session = reader
            .query_row(
                "SELECT * FROM sessions WHERE id = ?1",
                params![session_id],
                Self::row_to_session,
            )
            .optional()?;

        let Some(mut session) = session else {
            return Ok(None);
        };

        let mut stmt = reader.prepare(
            "SELECT * FROM attempts WHERE session_id = ?1 ORDER BY recorded_at ASC, rowid ASC",
        )?;
        let history = stmt.query_map(params![session_id], Self::row_to_attempt)?;
        session.history = history.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(session))
    }
}
