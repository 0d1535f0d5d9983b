//! The item-store seam between the session manager and persistence

use super::Result;
use crate::item::Candidate;
use crate::retention::RetentionState;
use crate::session::{Attempt, AttemptTotals, Session};

/// Persistence operations the session manager depends on.
///
/// Implementations must be safe to share across threads. `commit_attempt`
/// is atomic: either the attempt and the retention write both land, or
/// neither does.
pub trait ItemStore: Send + Sync {
    /// Every item matching `topics` (empty = all) with its retention state
    fn fetch_candidates(&self, topics: &[String]) -> Result<Vec<Candidate>>;

    /// One item with its retention state
    fn load_candidate(&self, item_id: &str) -> Result<Option<Candidate>>;

    /// Overwrite an item's retention state
    fn save_retention_state(&self, item_id: &str, state: &RetentionState) -> Result<()>;

    /// Append an attempt and, when given, write the item's new retention state
    fn commit_attempt(&self, attempt: &Attempt, retention: Option<&RetentionState>) -> Result<()>;

    /// Lifetime attempt counts
    fn attempt_totals(&self) -> Result<AttemptTotals>;

    /// Insert or replace a session record
    fn save_session(&self, session: &Session) -> Result<()>;

    /// Load a session record with its attempt history
    fn load_session(&self, session_id: &str) -> Result<Option<Session>>;
}
