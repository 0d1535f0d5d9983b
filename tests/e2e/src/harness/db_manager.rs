//! Test Database Manager
//!
//! Provides isolated drill databases for testing:
//! - Temporary databases that are automatically cleaned up
//! - A session manager wired to the same store
//! - Seeding helpers for new and due items

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use drill_core::{EngineConfig, ItemKind, ItemStore, NewItem, RetentionState, SessionManager, Storage};
use tempfile::TempDir;

/// Manager for test databases
///
/// Each instance owns its own SQLite file, so tests never interfere.
///
/// # Example
///
/// ```rust,ignore
/// let db = TestDatabaseManager::new_temp();
/// let ids = db.seed_words(5, "gre");
/// let start = db.manager.start(&StartRequest::new("flashcard", vec![], 10))?;
/// ```
pub struct TestDatabaseManager {
    pub storage: Arc<Storage>,
    pub manager: Arc<SessionManager>,
    /// Kept alive so the directory outlives the storage
    _temp_dir: TempDir,
    db_path: PathBuf,
}

impl TestDatabaseManager {
    /// A fresh database with default engine settings
    pub fn new_temp() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    /// A fresh database with custom engine settings
    pub fn with_config(config: &EngineConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test_drill.db");

        let storage = Arc::new(
            Storage::new(Some(db_path.clone()))
                .expect("Failed to create test storage")
                .with_initial_ease(config.retention.initial_ease),
        );
        let manager = Arc::new(SessionManager::new(storage.clone(), config));

        Self {
            storage,
            manager,
            _temp_dir: temp_dir,
            db_path,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    pub fn item_count(&self) -> usize {
        self.storage.count_items().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    // ========================================================================
    // SEEDING METHODS
    // ========================================================================

    /// Register `count` never-reviewed words tagged with `topic`
    pub fn seed_words(&self, count: usize, topic: &str) -> Vec<String> {
        (0..count)
            .map(|i| {
                self.storage
                    .add_item(NewItem {
                        kind: ItemKind::Word,
                        content: serde_json::json!({
                            "word": format!("{}-word-{}", topic, i),
                            "definition": format!("definition {}", i),
                        }),
                        tags: vec![topic.to_string()],
                    })
                    .expect("Failed to seed word")
                    .id
            })
            .collect()
    }

    /// Register `count` never-reviewed questions tagged with `topic`
    pub fn seed_questions(&self, count: usize, topic: &str) -> Vec<String> {
        (0..count)
            .map(|i| {
                self.storage
                    .add_item(NewItem {
                        kind: ItemKind::Question,
                        content: serde_json::json!({
                            "question": format!("{} question {}", topic, i),
                            "choices": ["a", "b", "c", "d"],
                            "answer": "a",
                        }),
                        tags: vec![topic.to_string()],
                    })
                    .expect("Failed to seed question")
                    .id
            })
            .collect()
    }

    /// Register words that came due `overdue_days[i]` days before `now`
    pub fn seed_due_words(
        &self,
        topic: &str,
        overdue_days: &[i64],
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let ids = self.seed_words(overdue_days.len(), topic);
        for (id, days) in ids.iter().zip(overdue_days) {
            self.set_due(id, now - Duration::days(*days));
        }
        ids
    }

    /// Give an item a reviewed state (one success, interval 1) due at `due`
    pub fn set_due(&self, item_id: &str, due: DateTime<Utc>) {
        let state = RetentionState {
            interval_days: 1,
            repetitions: 1,
            next_due: Some(due),
            last_result: Some(true),
            ..RetentionState::default()
        };
        self.storage
            .save_retention_state(item_id, &state)
            .expect("Failed to set retention state");
    }

    /// Current retention state of an item
    pub fn retention(&self, item_id: &str) -> RetentionState {
        self.storage
            .load_candidate(item_id)
            .expect("Failed to load item")
            .expect("Item not found")
            .state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_database_is_isolated() {
        let first = TestDatabaseManager::new_temp();
        let second = TestDatabaseManager::new_temp();

        first.seed_words(3, "gre");

        assert_eq!(first.item_count(), 3);
        assert!(second.is_empty());
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn test_seed_due_words() {
        let db = TestDatabaseManager::new_temp();
        let now = Utc::now();
        let ids = db.seed_due_words("gre", &[3, 1], now);

        assert!(db.retention(&ids[0]).is_due(now));
        assert!(db.retention(&ids[0]).next_due < db.retention(&ids[1]).next_due);
    }
}
