//! Session error taxonomy

use super::types::SessionState;
use crate::storage::StorageError;

/// Errors surfaced by the session manager
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Malformed input; not retried
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Unknown session id
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    /// Session is completed or ended
    #[error("Session {id} is not active (state: {state})")]
    SessionNotActive { id: String, state: SessionState },
    /// Attempt does not target the item at the cursor
    #[error("Item mismatch in session {session_id}: expected {expected:?}, got {actual}")]
    ItemMismatch {
        session_id: String,
        expected: Option<String>,
        actual: String,
    },
    /// Item no longer exists in the store
    #[error("Item not found: {0}")]
    ItemNotFound(String),
    /// Storage failed and retries were exhausted
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    /// Non-transient storage failure
    #[error("Storage error: {0}")]
    Storage(StorageError),
    /// Poisoned lock or similar invariant break
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Stable machine-readable name
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::InvalidRequest(_) => "InvalidRequest",
            SessionError::SessionNotFound(_) => "SessionNotFound",
            SessionError::SessionNotActive { .. } => "SessionNotActive",
            SessionError::ItemMismatch { .. } => "ItemMismatch",
            SessionError::ItemNotFound(_) => "ItemNotFound",
            SessionError::StorageUnavailable(_) => "StorageUnavailable",
            SessionError::Storage(_) => "StorageError",
            SessionError::Internal(_) => "InternalError",
        }
    }
}

impl From<StorageError> for SessionError {
    fn from(e: StorageError) -> Self {
        if e.is_transient() {
            return SessionError::StorageUnavailable(e.to_string());
        }
        match e {
            StorageError::NotFound(id) => SessionError::ItemNotFound(id),
            other => SessionError::Storage(other),
        }
    }
}

/// Session result type
pub type Result<T> = std::result::Result<T, SessionError>;
