//! Drill server library
//!
//! The HTTP API is exposed as a library so the binary and the end-to-end
//! tests build the same router.

pub mod api;

use std::path::PathBuf;
use std::sync::Arc;

use drill_core::{EngineConfig, SessionManager, Storage, StorageError};

/// Database file name inside a data directory
pub const DB_FILE_NAME: &str = "drill.db";

/// Default API port
pub const DEFAULT_PORT: u16 = 3928;

/// Open storage under `data_dir` (or the platform default) and wire a session manager to it
pub fn open_engine(
    data_dir: Option<PathBuf>,
    config: &EngineConfig,
) -> Result<(Arc<Storage>, Arc<SessionManager>), StorageError> {
    let db_path = data_dir.map(|dir| dir.join(DB_FILE_NAME));
    let storage = Arc::new(Storage::new(db_path)?.with_initial_ease(config.retention.initial_ease));
    let manager = Arc::new(SessionManager::new(storage.clone(), config));
    Ok((storage, manager))
}
