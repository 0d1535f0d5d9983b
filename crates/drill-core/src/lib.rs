//! # Drill Core
//!
//! Spaced-repetition engine for vocabulary words and practice questions.
//!
//! - **Retention**: SM-2 style updates from binary recall outcomes
//! - **Scheduling**: due-first queue selection with a per-session cap on new items
//! - **Sessions**: ordered study runs with strict in-order attempts,
//!   per-item serialisation and retry on transient storage failures
//! - **Storage**: SQLite (WAL) item store with an append-only attempt log
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use drill_core::{AttemptInput, EngineConfig, NewItem, SessionManager, StartRequest, Storage};
//!
//! let storage = Arc::new(Storage::new(None)?);
//! storage.add_item(NewItem {
//!     content: serde_json::json!({ "word": "laconic", "definition": "using few words" }),
//!     tags: vec!["gre".into()],
//!     ..Default::default()
//! })?;
//!
//! let manager = SessionManager::new(storage.clone(), &EngineConfig::default());
//! let start = manager.start(&StartRequest::new("flashcard", vec!["gre".into()], 20))?;
//!
//! let outcome = manager.record_attempt(&start.session_id, &AttemptInput {
//!     item_id: start.items[0].id.clone(),
//!     response: "terse".into(),
//!     correct: true,
//!     latency_ms: 2100,
//! })?;
//! println!("next review in {} days", outcome.retention.interval_days);
//! ```
//!
//! ## Feature Flags
//!
//! - `bundled-sqlite` (default): statically linked SQLite
//! - `encryption`: SQLCipher, keyed from `DRILL_ENCRYPTION_KEY`

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod config;
pub mod item;
pub mod retention;
pub mod scheduler;
pub mod session;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use config::EngineConfig;

pub use item::{normalize_tags, Candidate, Item, ItemKind, NewItem};

pub use retention::{
    format_interval, RetentionConfig, RetentionPreview, RetentionState, RetentionUpdater,
    DEFAULT_EASE, DEFAULT_MAX_EASE, DEFAULT_MIN_EASE, MAX_INTERVAL_DAYS,
};

pub use scheduler::{
    QueueCounts, QueueQuery, Scheduler, SchedulerConfig, Selection, DEFAULT_MAX_NEW_PER_SESSION,
};

pub use session::{
    Attempt, AttemptInput, AttemptOutcome, AttemptTotals, EndOutcome, RetryPolicy, Session,
    SessionError, SessionItem, SessionManager, SessionMode, SessionStart, SessionState,
    SessionStats, SessionSummary, StartRequest,
};

pub use storage::{ItemStore, Result, Storage, StorageError};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        AttemptInput, EngineConfig, Item, ItemKind, ItemStore, NewItem, QueueQuery,
        RetentionState, Result, Scheduler, SessionError, SessionManager, SessionState,
        StartRequest, Storage, StorageError,
    };
}
