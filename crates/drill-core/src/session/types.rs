//! Session records, attempts, and the lifecycle state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::SessionError;
use crate::item::{Candidate, Item, ItemKind};
use crate::retention::RetentionState;

// ============================================================================
// MODE & STATE
// ============================================================================

/// How items are presented during a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    Flashcard,
    MultipleChoice,
    Typed,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Flashcard => "flashcard",
            SessionMode::MultipleChoice => "multiple-choice",
            SessionMode::Typed => "typed",
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flashcard" => Ok(SessionMode::Flashcard),
            "multiple-choice" | "multiple_choice" | "multichoice" => {
                Ok(SessionMode::MultipleChoice)
            }
            "typed" => Ok(SessionMode::Typed),
            _ => Err(format!("Unknown session mode: {}", s)),
        }
    }
}

/// Session lifecycle
///
/// `NotStarted -> Active -> Completed`, with `Ended` reachable from
/// `Active` or `Completed` by explicit termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    NotStarted,
    Active,
    Completed,
    Ended,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::NotStarted => "not_started",
            SessionState::Active => "active",
            SessionState::Completed => "completed",
            SessionState::Ended => "ended",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(SessionState::NotStarted),
            "active" => Ok(SessionState::Active),
            "completed" => Ok(SessionState::Completed),
            "ended" => Ok(SessionState::Ended),
            _ => Err(format!("Unknown session state: {}", s)),
        }
    }
}

// ============================================================================
// ATTEMPTS
// ============================================================================

/// A response reported by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptInput {
    pub item_id: String,
    /// Raw response payload
    #[serde(default)]
    pub response: String,
    pub correct: bool,
    #[serde(default)]
    pub latency_ms: u64,
}

/// One recorded response to one item. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: String,
    /// Owning session; `None` for attempts recorded outside a session
    pub session_id: Option<String>,
    pub item_id: String,
    pub item_kind: ItemKind,
    pub response: String,
    pub correct: bool,
    pub latency_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

impl Attempt {
    pub fn new(
        session_id: Option<String>,
        item_kind: ItemKind,
        input: &AttemptInput,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id,
            item_id: input.item_id.clone(),
            item_kind,
            response: input.response.clone(),
            correct: input.correct,
            latency_ms: input.latency_ms,
            recorded_at,
        }
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// One slot in a session's item sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionItem {
    pub item_id: String,
    pub kind: ItemKind,
}

impl From<&Candidate> for SessionItem {
    fn from(candidate: &Candidate) -> Self {
        Self {
            item_id: candidate.item.id.clone(),
            kind: candidate.item.kind,
        }
    }
}

/// A bounded sequence of items assigned to one study run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub mode: SessionMode,
    pub topics: Vec<String>,
    pub items: Vec<SessionItem>,
    pub cursor: usize,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    /// Set on completion or explicit end
    pub ended_at: Option<DateTime<Utc>>,
    /// Attempts recorded in this session, in order
    #[serde(default)]
    pub history: Vec<Attempt>,
}

impl Session {
    /// A session that has not been started yet
    pub fn new(
        mode: SessionMode,
        topics: Vec<String>,
        items: Vec<SessionItem>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            mode,
            topics,
            items,
            cursor: 0,
            state: SessionState::NotStarted,
            created_at,
            ended_at: None,
            history: Vec::new(),
        }
    }

    /// `NotStarted -> Active`; a session with no items goes straight to `Completed`
    pub fn activate(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        if self.state != SessionState::NotStarted {
            return Err(self.not_active());
        }
        self.cursor = 0;
        if self.items.is_empty() {
            self.state = SessionState::Completed;
            self.ended_at = Some(now);
        } else {
            self.state = SessionState::Active;
        }
        Ok(())
    }

    /// Item at the cursor, if any remain
    pub fn current_item(&self) -> Option<&SessionItem> {
        self.items.get(self.cursor)
    }

    /// Items not yet attempted
    pub fn remaining(&self) -> usize {
        self.items.len().saturating_sub(self.cursor)
    }

    pub fn ensure_active(&self) -> Result<(), SessionError> {
        if self.state == SessionState::Active {
            Ok(())
        } else {
            Err(self.not_active())
        }
    }

    /// Guard against out-of-order or duplicate submissions
    pub fn check_current(&self, item_id: &str) -> Result<&SessionItem, SessionError> {
        self.ensure_active()?;
        match self.current_item() {
            Some(slot) if slot.item_id == item_id => Ok(slot),
            slot => Err(SessionError::ItemMismatch {
                session_id: self.id.clone(),
                expected: slot.map(|s| s.item_id.clone()),
                actual: item_id.to_string(),
            }),
        }
    }

    /// Append an accepted attempt and move the cursor.
    ///
    /// Moving past the last item completes the session.
    pub fn advance(&mut self, attempt: Attempt) -> Result<(), SessionError> {
        self.check_current(&attempt.item_id)?;
        let completed_at = attempt.recorded_at;
        self.history.push(attempt);
        self.cursor += 1;
        if self.cursor >= self.items.len() {
            self.state = SessionState::Completed;
            self.ended_at = Some(completed_at);
        }
        Ok(())
    }

    /// `Active | Completed -> Ended`. Ending an ended session changes nothing.
    ///
    /// Returns the end timestamp. A completed session keeps its completion time.
    pub fn end(&mut self, now: DateTime<Utc>) -> Result<DateTime<Utc>, SessionError> {
        match self.state {
            SessionState::NotStarted => Err(self.not_active()),
            SessionState::Ended => Ok(self.ended_at.unwrap_or(now)),
            SessionState::Active | SessionState::Completed => {
                let ended_at = self.ended_at.unwrap_or(now);
                self.state = SessionState::Ended;
                self.ended_at = Some(ended_at);
                Ok(ended_at)
            }
        }
    }

    /// Time of the latest accepted attempt, or creation if none
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.history
            .last()
            .map_or(self.created_at, |attempt| attempt.recorded_at)
    }

    /// Completed or ended
    pub fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Completed | SessionState::Ended)
    }

    pub fn summary(&self) -> SessionSummary {
        let attempts = self.history.len();
        let correct = self.history.iter().filter(|a| a.correct).count();
        SessionSummary {
            attempts,
            correct,
            accuracy: ratio(correct as u64, attempts as u64),
            remaining: self.remaining(),
        }
    }

    fn not_active(&self) -> SessionError {
        SessionError::SessionNotActive {
            id: self.id.clone(),
            state: self.state,
        }
    }
}

pub(crate) fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

// ============================================================================
// REQUESTS & OUTCOMES
// ============================================================================

/// Parameters for starting a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    /// `flashcard`, `multiple-choice`, or `typed`
    pub mode: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default = "default_include_new")]
    pub include_new: bool,
}

fn default_limit() -> i64 {
    20
}

fn default_include_new() -> bool {
    true
}

impl StartRequest {
    pub fn new(mode: impl Into<String>, topics: Vec<String>, limit: i64) -> Self {
        Self {
            mode: mode.into(),
            topics,
            limit,
            include_new: true,
        }
    }
}

/// A freshly started session and its ordered items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub session_id: String,
    pub mode: SessionMode,
    pub state: SessionState,
    pub items: Vec<Item>,
    pub due_count: usize,
    pub new_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Result of an accepted attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOutcome {
    pub attempt_id: String,
    pub item_id: String,
    pub session_id: Option<String>,
    /// Cursor after the attempt (0 outside a session)
    pub cursor: usize,
    pub remaining: usize,
    pub session_state: Option<SessionState>,
    pub next_item_id: Option<String>,
    /// Retention state written for the item
    pub retention: RetentionState,
}

/// Per-session figures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub attempts: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub remaining: usize,
}

/// Result of ending a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndOutcome {
    pub session_id: String,
    pub ended_at: DateTime<Utc>,
    pub state: SessionState,
    pub summary: SessionSummary,
}

/// Lifetime attempt counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptTotals {
    pub total: u64,
    pub correct: u64,
}

/// Process-wide aggregate view
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_items: usize,
    pub due_count: usize,
    pub new_count: usize,
    pub upcoming_count: usize,
    pub total_attempts: u64,
    pub correct_attempts: u64,
    /// Lifetime accuracy; 0 with no attempts
    pub accuracy: f64,
    pub active_sessions: usize,
}
