//! End-to-end test support for drill
//!
//! - `harness`: isolated databases with a session manager wired in
//! - `mocks`: vocabulary and question fixtures

pub mod mocks;

pub use harness::TestDatabaseManager;
pub use mocks::{BatchConfig, MixedQueueScenario, TestDataFactory};
