//! Retention Module
//!
//! SM-2 family interval scheduling driven by binary recall outcomes.
//!
//! Reference: P. A. Wozniak, "Optimization of learning" (1990), algorithm SM-2.
//!
//! ## Update rules
//! - Success: repetitions + 1; interval 1 day, then 6 days, then `round(interval * ease)`;
//!   ease nudged up toward a ceiling
//! - Lapse: repetitions reset to 0, interval 1 day, ease nudged down toward a floor
//! - `next_due = now + interval` after every update
//!
//! The updater is a pure function over [`RetentionState`], so any history of outcomes
//! can be replayed to reproduce the stored state.

mod algorithm;

pub use algorithm::{
    format_interval, RetentionConfig, RetentionPreview, RetentionState, RetentionUpdater,
    DEFAULT_EASE, DEFAULT_MAX_EASE, DEFAULT_MIN_EASE, LAPSE_PENALTY, MAX_INTERVAL_DAYS,
    SUCCESS_BONUS,
};
