//! Due-Item Scheduler
//!
//! Chooses which items a study session covers. Pure function over
//! `(item, retention state)` pairs and a reference time:
//!
//! 1. Filter by topic (`tags ∩ topics ≠ ∅`, empty topics = no filter)
//! 2. Partition into due (`next_due <= t`), new (`next_due` absent), and not-due
//! 3. Due items most-overdue first, new items in creation order
//! 4. Fill up to `limit`: due first, then new items up to the per-session new cap

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::item::Candidate;

/// Default cap on never-reviewed items per session
pub const DEFAULT_MAX_NEW_PER_SESSION: usize = 50;

/// Scheduler tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Maximum new items in one session, regardless of the requested limit
    pub max_new_per_session: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_new_per_session: DEFAULT_MAX_NEW_PER_SESSION,
        }
    }
}

/// What to select
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueQuery {
    /// Topic filter; empty matches every item
    #[serde(default)]
    pub topics: Vec<String>,
    /// Maximum items returned
    pub limit: usize,
    /// Whether never-reviewed items may fill the queue
    #[serde(default = "default_include_new")]
    pub include_new: bool,
}

fn default_include_new() -> bool {
    true
}

impl QueueQuery {
    pub fn new(topics: Vec<String>, limit: usize) -> Self {
        Self {
            topics,
            limit,
            include_new: true,
        }
    }
}

/// Result of a selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Ordered items: due first, then new
    pub items: Vec<Candidate>,
    /// How many of `items` are due reviews
    pub due_count: usize,
    /// How many of `items` are new
    pub new_count: usize,
}

/// Counts of the review queue at a reference time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueCounts {
    pub total: usize,
    pub due: usize,
    pub new: usize,
    /// Reviewed items not yet due
    pub upcoming: usize,
}

/// Selects due and new items for a session
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Ordered items for a session: due first, then new, at most `limit`
    pub fn select_due(
        &self,
        candidates: Vec<Candidate>,
        reference_time: DateTime<Utc>,
        topics: &[String],
        limit: usize,
    ) -> Vec<Candidate> {
        self.select(candidates, reference_time, &QueueQuery::new(topics.to_vec(), limit))
            .items
    }

    /// Full selection with per-bucket counts
    pub fn select(
        &self,
        candidates: Vec<Candidate>,
        reference_time: DateTime<Utc>,
        query: &QueueQuery,
    ) -> Selection {
        let mut due = Vec::new();
        let mut new = Vec::new();

        for candidate in candidates {
            if !candidate.item.matches_topics(&query.topics) {
                continue;
            }
            match candidate.state.next_due {
                None => new.push(candidate),
                Some(next_due) if next_due <= reference_time => due.push(candidate),
                Some(_) => {}
            }
        }

        due.sort_by(|a, b| {
            a.state
                .next_due
                .cmp(&b.state.next_due)
                .then_with(|| a.item.id.cmp(&b.item.id))
        });
        new.sort_by(|a, b| {
            a.item
                .created_at
                .cmp(&b.item.created_at)
                .then_with(|| a.item.id.cmp(&b.item.id))
        });

        let available_due = due.len();
        let available_new = new.len();

        due.truncate(query.limit);
        let new_budget = if query.include_new {
            (query.limit - due.len()).min(self.config.max_new_per_session)
        } else {
            0
        };
        new.truncate(new_budget);

        debug!(
            available_due,
            available_new,
            selected_due = due.len(),
            selected_new = new.len(),
            limit = query.limit,
            "Selected review queue"
        );

        let due_count = due.len();
        let new_count = new.len();
        let mut items = due;
        items.extend(new);

        Selection {
            items,
            due_count,
            new_count,
        }
    }

    /// Queue counts over every candidate
    pub fn queue_counts(candidates: &[Candidate], reference_time: DateTime<Utc>) -> QueueCounts {
        let mut counts = QueueCounts {
            total: candidates.len(),
            ..Default::default()
        };
        for candidate in candidates {
            if candidate.state.is_new() {
                counts.new += 1;
            } else if candidate.state.is_due(reference_time) {
                counts.due += 1;
            }
        }
        counts.upcoming = counts.total - counts.due - counts.new;
        counts
    }
}
