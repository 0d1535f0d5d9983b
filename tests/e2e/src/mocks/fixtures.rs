//! Test Data Factory
//!
//! Realistic study material for journey tests:
//! - Vocabulary words and multiple-choice questions
//! - Batch generation for larger queues
//! - Pre-built queue scenarios mixing due, new and off-topic items

use chrono::{DateTime, Duration, Utc};
use drill_core::{Item, ItemKind, ItemStore, NewItem, RetentionState, Storage};

/// A few real GRE words with definitions
pub const GRE_WORDS: &[(&str, &str)] = &[
    ("laconic", "using very few words"),
    ("obdurate", "stubbornly refusing to change one's opinion"),
    ("pellucid", "translucently clear"),
    ("quixotic", "exceedingly idealistic"),
    ("recondite", "little known; abstruse"),
    ("sagacious", "having keen discernment"),
];

/// Factory for study items
///
/// # Example
///
/// ```rust,ignore
/// let word = TestDataFactory::create_word(&storage, "laconic", "terse", &["gre"]);
/// let scenario = TestDataFactory::create_mixed_queue(&storage, Utc::now());
/// ```
pub struct TestDataFactory;

/// Configuration for batch item generation
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub count: usize,
    pub kind: ItemKind,
    pub content_prefix: String,
    pub tags: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            count: 10,
            kind: ItemKind::Word,
            content_prefix: "entry".to_string(),
            tags: vec![],
        }
    }
}

/// A queue with overdue, new and off-topic items, all under known ids
#[derive(Debug, Clone)]
pub struct MixedQueueScenario {
    /// Tagged `gre`, most overdue first
    pub due_ids: Vec<String>,
    /// Tagged `gre`, never reviewed, oldest first
    pub new_ids: Vec<String>,
    /// Tagged `sat`, overdue
    pub other_topic_ids: Vec<String>,
    /// Tagged `gre`, reviewed and due in the future
    pub upcoming_ids: Vec<String>,
}

impl TestDataFactory {
    pub fn create_word(storage: &Storage, word: &str, definition: &str, tags: &[&str]) -> Item {
        storage
            .add_item(NewItem {
                kind: ItemKind::Word,
                content: serde_json::json!({ "word": word, "definition": definition }),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            })
            .expect("Failed to create word")
    }

    pub fn create_question(
        storage: &Storage,
        question: &str,
        choices: &[&str],
        answer: &str,
        tags: &[&str],
    ) -> Item {
        storage
            .add_item(NewItem {
                kind: ItemKind::Question,
                content: serde_json::json!({
                    "question": question,
                    "choices": choices,
                    "answer": answer,
                }),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            })
            .expect("Failed to create question")
    }

    /// Every entry of [`GRE_WORDS`], tagged `gre`, in order
    pub fn create_gre_deck(storage: &Storage) -> Vec<Item> {
        GRE_WORDS
            .iter()
            .map(|(word, definition)| Self::create_word(storage, word, definition, &["gre"]))
            .collect()
    }

    pub fn create_batch(storage: &Storage, config: &BatchConfig) -> Vec<Item> {
        (0..config.count)
            .map(|i| {
                let text = format!("{} {}", config.content_prefix, i);
                let content = match config.kind {
                    ItemKind::Word => serde_json::json!({ "word": text }),
                    ItemKind::Question => serde_json::json!({ "question": text }),
                };
                storage
                    .add_item(NewItem {
                        kind: config.kind,
                        content,
                        tags: config.tags.clone(),
                    })
                    .expect("Failed to create batch item")
            })
            .collect()
    }

    /// Write a reviewed state due at `due`
    pub fn schedule(storage: &Storage, item_id: &str, due: DateTime<Utc>, repetitions: u32, interval_days: u32) {
        let state = RetentionState {
            interval_days,
            repetitions,
            next_due: Some(due),
            last_result: Some(true),
            ..RetentionState::default()
        };
        storage
            .save_retention_state(item_id, &state)
            .expect("Failed to schedule item");
    }

    /// Two overdue, three new, one upcoming `gre` items and one overdue `sat` item
    pub fn create_mixed_queue(storage: &Storage, now: DateTime<Utc>) -> MixedQueueScenario {
        let mut due_ids = Vec::new();
        for (days, word) in [(5, "laconic"), (2, "obdurate")] {
            let item = Self::create_word(storage, word, "due", &["gre"]);
            Self::schedule(storage, &item.id, now - Duration::days(days), 2, 6);
            due_ids.push(item.id);
        }

        let new_ids = ["pellucid", "quixotic", "recondite"]
            .iter()
            .map(|word| Self::create_word(storage, word, "new", &["gre"]).id)
            .collect();

        let upcoming = Self::create_word(storage, "sagacious", "upcoming", &["gre"]);
        Self::schedule(storage, &upcoming.id, now + Duration::days(4), 3, 15);

        let other = Self::create_question(
            storage,
            "Which word means 'bold'?",
            &["audacious", "timid"],
            "audacious",
            &["sat"],
        );
        Self::schedule(storage, &other.id, now - Duration::days(10), 1, 1);

        MixedQueueScenario {
            due_ids,
            new_ids,
            other_topic_ids: vec![other.id],
            upcoming_ids: vec![upcoming.id],
        }
    }
}
