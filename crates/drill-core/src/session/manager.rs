//! Session manager: owns live sessions and routes attempts to storage

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::error::{Result, SessionError};
use super::retry::{with_retry, RetryPolicy};
use super::types::{
    ratio, Attempt, AttemptInput, AttemptOutcome, EndOutcome, Session, SessionItem, SessionMode,
    SessionStart, SessionState, SessionStats, StartRequest,
};
use crate::config::EngineConfig;
use crate::item::normalize_tags;
use crate::retention::{RetentionState, RetentionUpdater};
use crate::scheduler::{QueueQuery, Scheduler, Selection};
use crate::storage::ItemStore;

type SessionHandle = Arc<Mutex<Session>>;

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| SessionError::Internal(format!("{} lock poisoned", what)))
}

fn poisoned<E>(_: E) -> SessionError {
    SessionError::Internal("session map lock poisoned".to_string())
}

/// Coordinates the scheduler, the retention updater and the item store.
///
/// All methods take `&self`; share the manager behind an `Arc`.
pub struct SessionManager {
    store: Arc<dyn ItemStore>,
    scheduler: Scheduler,
    updater: RetentionUpdater,
    retry: RetryPolicy,
    max_session_limit: usize,
    sessions: RwLock<HashMap<String, SessionHandle>>,
    item_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn ItemStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            scheduler: Scheduler::new(config.scheduler),
            updater: RetentionUpdater::new(config.retention),
            retry: config.retry,
            max_session_limit: config.max_session_limit,
            sessions: RwLock::new(HashMap::new()),
            item_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn updater(&self) -> &RetentionUpdater {
        &self.updater
    }

    // ========================================================================
    // START
    // ========================================================================

    /// Select items and open a new session
    pub fn start(&self, request: &StartRequest) -> Result<SessionStart> {
        self.start_at(request, Utc::now())
    }

    pub fn start_at(&self, request: &StartRequest, now: DateTime<Utc>) -> Result<SessionStart> {
        let mode: SessionMode = request.mode.parse().map_err(SessionError::InvalidRequest)?;
        let limit = self.validate_limit(request.limit)?;
        let topics = normalize_tags(&request.topics);

        let candidates = with_retry(&self.retry, "fetch candidates", || {
            self.store.fetch_candidates(&topics)
        })?;
        let query = QueueQuery {
            topics: topics.clone(),
            limit,
            include_new: request.include_new,
        };
        let selection = self.scheduler.select(candidates, now, &query);

        let slots = selection.items.iter().map(SessionItem::from).collect();
        let mut session = Session::new(mode, topics, slots, now);
        session.activate(now)?;

        with_retry(&self.retry, "save session", || self.store.save_session(&session))?;

        let start = SessionStart {
            session_id: session.id.clone(),
            mode,
            state: session.state,
            items: selection.items.into_iter().map(|c| c.item).collect(),
            due_count: selection.due_count,
            new_count: selection.new_count,
            created_at: now,
        };

        self.sessions
            .write()
            .map_err(poisoned)?
            .insert(session.id.clone(), Arc::new(Mutex::new(session)));

        info!(
            session_id = %start.session_id,
            mode = %mode,
            items = start.items.len(),
            due = start.due_count,
            new = start.new_count,
            "Session started"
        );

        Ok(start)
    }

    fn validate_limit(&self, limit: i64) -> Result<usize> {
        if limit <= 0 {
            return Err(SessionError::InvalidRequest(format!(
                "limit must be positive, got {}",
                limit
            )));
        }
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        if limit > self.max_session_limit {
            return Err(SessionError::InvalidRequest(format!(
                "limit must be at most {}, got {}",
                self.max_session_limit, limit
            )));
        }
        Ok(limit)
    }

    // ========================================================================
    // ATTEMPTS
    // ========================================================================

    /// Record the answer to the item at the session's cursor
    pub fn record_attempt(&self, session_id: &str, input: &AttemptInput) -> Result<AttemptOutcome> {
        self.record_attempt_at(session_id, input, Utc::now())
    }

    pub fn record_attempt_at(
        &self,
        session_id: &str,
        input: &AttemptInput,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome> {
        validate_item_id(input)?;

        let handle = match self.find_live(session_id)? {
            Some(handle) => handle,
            None => return Err(self.not_live(session_id)?),
        };
        let mut session = lock(&handle, "session")?;
        session.check_current(&input.item_id)?;

        // Cursor moves only after the attempt is durably committed
        let (attempt, retention) = self.apply_outcome(Some(session.id.as_str()), input, now)?;
        let attempt_id = attempt.id.clone();
        session.advance(attempt)?;

        let outcome = AttemptOutcome {
            attempt_id,
            item_id: input.item_id.clone(),
            session_id: Some(session.id.clone()),
            cursor: session.cursor,
            remaining: session.remaining(),
            session_state: Some(session.state),
            next_item_id: session.current_item().map(|slot| slot.item_id.clone()),
            retention,
        };

        debug!(
            session_id = %session.id,
            item_id = %input.item_id,
            correct = input.correct,
            cursor = session.cursor,
            "Attempt recorded"
        );

        if session.state == SessionState::Completed {
            let summary = session.summary();
            info!(
                session_id = %session.id,
                attempts = summary.attempts,
                accuracy = summary.accuracy,
                "Session completed"
            );
            if let Err(e) = with_retry(&self.retry, "save session", || {
                self.store.save_session(&session)
            }) {
                warn!(session_id = %session.id, "Failed to persist completed session: {}", e);
            }
        }

        Ok(outcome)
    }

    /// Record an attempt that belongs to no session
    pub fn log_attempt(&self, input: &AttemptInput) -> Result<AttemptOutcome> {
        self.log_attempt_at(input, Utc::now())
    }

    pub fn log_attempt_at(&self, input: &AttemptInput, now: DateTime<Utc>) -> Result<AttemptOutcome> {
        validate_item_id(input)?;
        let (attempt, retention) = self.apply_outcome(None, input, now)?;
        debug!(item_id = %input.item_id, correct = input.correct, "Attempt logged");

        Ok(AttemptOutcome {
            attempt_id: attempt.id,
            item_id: attempt.item_id,
            session_id: None,
            cursor: 0,
            remaining: 0,
            session_state: None,
            next_item_id: None,
            retention,
        })
    }

    /// Read-modify-write of one item's retention state under its item lock
    fn apply_outcome(
        &self,
        session_id: Option<&str>,
        input: &AttemptInput,
        now: DateTime<Utc>,
    ) -> Result<(Attempt, RetentionState)> {
        let item_lock = self.item_lock(&input.item_id)?;
        let result = self.apply_outcome_locked(&item_lock, session_id, input, now);
        self.release_item_lock(&input.item_id, item_lock);
        result
    }

    fn apply_outcome_locked(
        &self,
        item_lock: &Mutex<()>,
        session_id: Option<&str>,
        input: &AttemptInput,
        now: DateTime<Utc>,
    ) -> Result<(Attempt, RetentionState)> {
        let _guard = lock(item_lock, "item")?;

        let candidate = with_retry(&self.retry, "load retention state", || {
            self.store.load_candidate(&input.item_id)
        })?
        .ok_or_else(|| SessionError::ItemNotFound(input.item_id.clone()))?;

        let retention = self.updater.apply(&candidate.state, input.correct, now);
        let attempt = Attempt::new(session_id.map(str::to_string), candidate.item.kind, input, now);

        with_retry(&self.retry, "commit attempt", || {
            self.store.commit_attempt(&attempt, Some(&retention))
        })?;

        Ok((attempt, retention))
    }

    fn item_lock(&self, item_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = lock(&self.item_locks, "item lock map")?;
        Ok(locks.entry(item_id.to_string()).or_default().clone())
    }

    fn release_item_lock(&self, item_id: &str, handle: Arc<Mutex<()>>) {
        if let Ok(mut locks) = self.item_locks.lock() {
            // Only the map and this caller hold it
            if Arc::strong_count(&handle) == 2 {
                locks.remove(item_id);
            }
        }
    }

    // ========================================================================
    // END
    // ========================================================================

    /// Terminate a session. Ending an ended session returns the same result.
    pub fn end(&self, session_id: &str) -> Result<EndOutcome> {
        self.end_at(session_id, Utc::now())
    }

    pub fn end_at(&self, session_id: &str, now: DateTime<Utc>) -> Result<EndOutcome> {
        let Some(handle) = self.find_live(session_id)? else {
            return self.end_archived(session_id, now);
        };
        let mut session = lock(&handle, "session")?;
        if session.state == SessionState::Ended {
            return Ok(end_outcome(&session, now));
        }

        let mut ended = session.clone();
        ended.end(now)?;
        with_retry(&self.retry, "save session", || self.store.save_session(&ended))?;
        *session = ended;

        let outcome = end_outcome(&session, now);
        info!(
            session_id = %session.id,
            attempts = outcome.summary.attempts,
            remaining = outcome.summary.remaining,
            "Session ended"
        );
        Ok(outcome)
    }

    /// End a session that is no longer held in memory
    fn end_archived(&self, session_id: &str, now: DateTime<Utc>) -> Result<EndOutcome> {
        let mut stored = self
            .load_archived(session_id)?
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        if stored.state != SessionState::Ended {
            stored.end(now)?;
            with_retry(&self.retry, "save session", || self.store.save_session(&stored))?;
            info!(session_id = %stored.id, "Archived session ended");
        }
        Ok(end_outcome(&stored, now))
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Snapshot of a session, live or archived
    pub fn session(&self, session_id: &str) -> Result<Session> {
        if let Some(handle) = self.find_live(session_id)? {
            return Ok(lock(&handle, "session")?.clone());
        }
        self.load_archived(session_id)?
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))
    }

    /// What a session started now would contain, without starting it
    pub fn preview_queue(&self, query: &QueueQuery) -> Result<Selection> {
        self.preview_queue_at(query, Utc::now())
    }

    pub fn preview_queue_at(&self, query: &QueueQuery, now: DateTime<Utc>) -> Result<Selection> {
        let limit = self.validate_limit(i64::try_from(query.limit).unwrap_or(i64::MAX))?;
        let topics = normalize_tags(&query.topics);
        let candidates = with_retry(&self.retry, "fetch candidates", || {
            self.store.fetch_candidates(&topics)
        })?;
        let query = QueueQuery {
            topics,
            limit,
            include_new: query.include_new,
        };
        Ok(self.scheduler.select(candidates, now, &query))
    }

    /// Aggregate counts over the whole store
    pub fn stats(&self) -> Result<SessionStats> {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> Result<SessionStats> {
        let candidates = with_retry(&self.retry, "fetch candidates", || {
            self.store.fetch_candidates(&[])
        })?;
        let counts = Scheduler::queue_counts(&candidates, now);
        let totals = with_retry(&self.retry, "attempt totals", || self.store.attempt_totals())?;

        Ok(SessionStats {
            total_items: counts.total,
            due_count: counts.due,
            new_count: counts.new,
            upcoming_count: counts.upcoming,
            total_attempts: totals.total,
            correct_attempts: totals.correct,
            accuracy: ratio(totals.correct, totals.total),
            active_sessions: self.active_sessions()?,
        })
    }

    /// Live sessions still accepting attempts
    pub fn active_sessions(&self) -> Result<usize> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions
            .values()
            .filter(|handle| {
                handle
                    .lock()
                    .map(|s| s.state == SessionState::Active)
                    .unwrap_or(false)
            })
            .count())
    }

    /// Drop completed and ended sessions that finished before `older_than`.
    ///
    /// Their records stay in the store. Returns how many were dropped.
    pub fn prune_ended(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let before = sessions.len();
        // A session locked by an in-flight call is still in use
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => {
                !(session.is_finished() && session.ended_at.is_some_and(|t| t < older_than))
            }
            Err(_) => true,
        });
        let pruned = before - sessions.len();
        if pruned > 0 {
            debug!(pruned, "Pruned finished sessions");
        }
        Ok(pruned)
    }

    /// End and drop active sessions with no activity since `idle_before`.
    ///
    /// Each is ended at its last activity and written back, so later
    /// attempts see `SessionNotActive`. Returns how many were abandoned.
    pub fn abandon_idle(&self, idle_before: DateTime<Utc>) -> Result<usize> {
        let mut stale: Vec<Session> = Vec::new();
        {
            let mut sessions = self.sessions.write().map_err(poisoned)?;
            sessions.retain(|_, handle| match handle.try_lock() {
                Ok(session)
                    if session.state == SessionState::Active
                        && session.last_activity() < idle_before =>
                {
                    stale.push(session.clone());
                    false
                }
                _ => true,
            });
        }

        for session in &mut stale {
            let last_activity = session.last_activity();
            session.end(last_activity)?;
            if let Err(e) = with_retry(&self.retry, "save session", || {
                self.store.save_session(&*session)
            }) {
                warn!(session_id = %session.id, "Failed to persist abandoned session: {}", e);
            }
        }

        if !stale.is_empty() {
            info!(abandoned = stale.len(), "Abandoned idle sessions");
        }
        Ok(stale.len())
    }

    fn find_live(&self, session_id: &str) -> Result<Option<SessionHandle>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(session_id).cloned())
    }

    fn load_archived(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(with_retry(&self.retry, "load session", || {
            self.store.load_session(session_id)
        })?)
    }

    /// Error for an attempt against a session that is not in memory
    fn not_live(&self, session_id: &str) -> Result<SessionError> {
        Ok(match self.load_archived(session_id)? {
            Some(stored) if stored.state != SessionState::Active => SessionError::SessionNotActive {
                id: stored.id,
                state: stored.state,
            },
            _ => SessionError::SessionNotFound(session_id.to_string()),
        })
    }
}

fn validate_item_id(input: &AttemptInput) -> Result<()> {
    if input.item_id.trim().is_empty() {
        return Err(SessionError::InvalidRequest("item_id must not be empty".to_string()));
    }
    Ok(())
}

fn end_outcome(session: &Session, fallback: DateTime<Utc>) -> EndOutcome {
    EndOutcome {
        session_id: session.id.clone(),
        ended_at: session.ended_at.unwrap_or(fallback),
        state: session.state,
        summary: session.summary(),
    }
}
