//! Storage Module
//!
//! SQLite-backed item store:
//! - Items with their SM-2 retention state
//! - Append-only attempt log
//! - Session records for ended and restarted sessions
//! - Tag filtering through the JSON1 extension

mod adapter;
mod migrations;
mod sqlite;

pub use adapter::ItemStore;
pub use migrations::MIGRATIONS;
pub use sqlite::{Result, Storage, StorageError};
