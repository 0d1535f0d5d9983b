pub mod fixtures;

pub use fixtures::{BatchConfig, MixedQueueScenario, TestDataFactory};
