//! Study Sessions
//!
//! A session is a fixed, ordered list of items chosen by the scheduler.
//! Attempts must arrive in order; each one updates the item's retention
//! state and is appended to the attempt log atomically.
//!
//! Concurrency: each live session sits behind its own mutex, so attempts
//! within one session are serialised while separate sessions proceed in
//! parallel. Retention updates for one item are serialised across sessions
//! through a per-item lock.

mod error;
mod manager;
mod retry;
mod types;

pub use error::{Result, SessionError};
pub use manager::SessionManager;
pub use retry::{with_retry, RetryPolicy};
pub use types::{
    Attempt, AttemptInput, AttemptOutcome, AttemptTotals, EndOutcome, Session, SessionItem,
    SessionMode, SessionStart, SessionState, SessionStats, SessionSummary, StartRequest,
};
