//! REST endpoint handlers
//!
//! Manager calls may sleep between storage retries, so they run on the
//! blocking pool rather than on the async workers.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::Utc;
use drill_core::session::Result as SessionResult;
use drill_core::{
    format_interval, normalize_tags, AttemptInput, AttemptOutcome, EndOutcome, QueueQuery,
    SessionManager, SessionStart, SessionState, SessionStats, SessionSummary, StartRequest,
};
use serde::Deserialize;
use serde_json::Value;

use super::error::ApiError;
use super::events::DrillEvent;
use super::state::AppState;

/// Default page size for queue previews
const DEFAULT_DUE_LIMIT: i64 = 20;

/// Attempts shown on the item detail endpoint
const ITEM_HISTORY_LIMIT: usize = 20;

async fn with_manager<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&SessionManager) -> SessionResult<T> + Send + 'static,
    T: Send + 'static,
{
    let manager = state.manager.clone();
    Ok(tokio::task::spawn_blocking(move || op(&manager)).await??)
}

// ============================================================================
// SESSIONS
// ============================================================================

/// Start a session: `POST /api/sessions`
pub async fn start_session(
    State(state): State<AppState>,
    request: Result<Json<StartRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionStart>), ApiError> {
    let Json(request) = request?;
    let start = with_manager(&state, move |m| m.start(&request)).await?;

    state.emit(DrillEvent::SessionStarted {
        session_id: start.session_id.clone(),
        mode: start.mode.to_string(),
        item_count: start.items.len(),
        due_count: start.due_count,
        new_count: start.new_count,
        timestamp: Utc::now(),
    });

    Ok((StatusCode::CREATED, Json(start)))
}

/// Session snapshot: `GET /api/sessions/{id}`
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = with_manager(&state, move |m| m.session(&id)).await?;

    Ok(Json(serde_json::json!({
        "id": session.id,
        "mode": session.mode,
        "state": session.state,
        "topics": session.topics,
        "items": session.items,
        "cursor": session.cursor,
        "currentItemId": session.current_item().map(|slot| slot.item_id.clone()),
        "createdAt": session.created_at.to_rfc3339(),
        "endedAt": session.ended_at.map(|t| t.to_rfc3339()),
        "summary": session.summary(),
    })))
}

/// Record an attempt: `POST /api/sessions/{id}/attempts`
pub async fn record_attempt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    input: Result<Json<AttemptInput>, JsonRejection>,
) -> Result<Json<AttemptOutcome>, ApiError> {
    let Json(input) = input?;
    let correct = input.correct;
    let (outcome, completed) = with_manager(&state, move |m| {
        let outcome = m.record_attempt(&id, &input)?;
        let completed: Option<SessionSummary> = match outcome.session_state {
            Some(SessionState::Completed) => Some(m.session(&id)?.summary()),
            _ => None,
        };
        Ok((outcome, completed))
    })
    .await?;

    state.emit(DrillEvent::AttemptRecorded {
        session_id: outcome.session_id.clone(),
        item_id: outcome.item_id.clone(),
        correct,
        interval_days: outcome.retention.interval_days,
        cursor: outcome.cursor,
        timestamp: Utc::now(),
    });
    if let (Some(summary), Some(session_id)) = (completed, outcome.session_id.clone()) {
        state.emit(DrillEvent::SessionCompleted {
            session_id,
            attempts: summary.attempts,
            accuracy: summary.accuracy,
            timestamp: Utc::now(),
        });
    }

    Ok(Json(outcome))
}

/// End a session: `POST /api/sessions/{id}/end`
pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EndOutcome>, ApiError> {
    let outcome = with_manager(&state, move |m| m.end(&id)).await?;

    state.emit(DrillEvent::SessionEnded {
        session_id: outcome.session_id.clone(),
        attempts: outcome.summary.attempts,
        remaining: outcome.summary.remaining,
        timestamp: Utc::now(),
    });

    Ok(Json(outcome))
}

/// Attempt outside any session: `POST /api/attempts`
pub async fn log_attempt(
    State(state): State<AppState>,
    input: Result<Json<AttemptInput>, JsonRejection>,
) -> Result<Json<AttemptOutcome>, ApiError> {
    let Json(input) = input?;
    let correct = input.correct;
    let outcome = with_manager(&state, move |m| m.log_attempt(&input)).await?;

    state.emit(DrillEvent::AttemptRecorded {
        session_id: None,
        item_id: outcome.item_id.clone(),
        correct,
        interval_days: outcome.retention.interval_days,
        cursor: 0,
        timestamp: Utc::now(),
    });

    Ok(Json(outcome))
}

// ============================================================================
// QUEUE & STATS
// ============================================================================

/// Aggregate statistics: `GET /api/stats`
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<SessionStats>, ApiError> {
    let stats = with_manager(&state, |m| m.stats()).await?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueParams {
    /// Comma-separated topic list
    pub topics: Option<String>,
    pub limit: Option<i64>,
    pub include_new: Option<bool>,
}

/// Preview the next queue: `GET /api/due`
pub async fn get_due(
    State(state): State<AppState>,
    params: Result<Query<DueParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params?;
    let limit = params.limit.unwrap_or(DEFAULT_DUE_LIMIT);
    if limit <= 0 {
        return Err(ApiError::bad_request(format!(
            "limit must be positive, got {}",
            limit
        )));
    }

    let topics = params
        .topics
        .as_deref()
        .map(|t| normalize_tags(t.split(',')))
        .unwrap_or_default();
    let query = QueueQuery {
        topics,
        limit: limit as usize,
        include_new: params.include_new.unwrap_or(true),
    };

    let selection = with_manager(&state, move |m| m.preview_queue(&query)).await?;

    let items: Vec<Value> = selection
        .items
        .iter()
        .map(|c| {
            serde_json::json!({
                "item": c.item,
                "retention": c.state,
                "isNew": c.state.is_new(),
                "interval": format_interval(c.state.interval_days),
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "total": items.len(),
        "dueCount": selection.due_count,
        "newCount": selection.new_count,
        "items": items,
    })))
}

// ============================================================================
// ITEMS & HEALTH
// ============================================================================

/// Item detail with retention preview: `GET /api/items/{id}`
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let storage = state.storage.clone();
    let lookup_id = id.clone();
    let (candidate, history) = tokio::task::spawn_blocking(move || {
        use drill_core::ItemStore;
        let candidate = storage.load_candidate(&lookup_id)?;
        let history = storage.item_attempts(&lookup_id, ITEM_HISTORY_LIMIT)?;
        Ok::<_, drill_core::StorageError>((candidate, history))
    })
    .await??;

    let candidate =
        candidate.ok_or_else(|| ApiError::not_found("ItemNotFound", format!("Item not found: {}", id)))?;
    let preview = state.manager.updater().preview(&candidate.state, Utc::now());

    Ok(Json(serde_json::json!({
        "item": candidate.item,
        "retention": candidate.state,
        "preview": {
            "onCorrect": preview.on_correct,
            "onIncorrect": preview.on_incorrect,
            "onCorrectInterval": format_interval(preview.on_correct.interval_days),
            "onIncorrectInterval": format_interval(preview.on_incorrect.interval_days),
        },
        "history": history,
    })))
}

/// Liveness: `GET /api/health`
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let active_sessions = state.manager.active_sessions().unwrap_or(0);
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": state.start_time.elapsed().as_secs(),
        "activeSessions": active_sessions,
    }))
}
