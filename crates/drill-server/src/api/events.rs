//! Real-time study events.
//!
//! Emitted by the API handlers after a session operation succeeds and
//! broadcast to every connected WebSocket client.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Every session operation emits one of these events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum DrillEvent {
    SessionStarted {
        session_id: String,
        mode: String,
        item_count: usize,
        due_count: usize,
        new_count: usize,
        timestamp: DateTime<Utc>,
    },
    AttemptRecorded {
        session_id: Option<String>,
        item_id: String,
        correct: bool,
        interval_days: u32,
        cursor: usize,
        timestamp: DateTime<Utc>,
    },
    SessionCompleted {
        session_id: String,
        attempts: usize,
        accuracy: f64,
        timestamp: DateTime<Utc>,
    },
    SessionEnded {
        session_id: String,
        attempts: usize,
        remaining: usize,
        timestamp: DateTime<Utc>,
    },
    Heartbeat {
        uptime_secs: u64,
        total_items: usize,
        due_count: usize,
        active_sessions: usize,
        timestamp: DateTime<Utc>,
    },
}

impl DrillEvent {
    /// Serialize to JSON string for WebSocket transmission.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
