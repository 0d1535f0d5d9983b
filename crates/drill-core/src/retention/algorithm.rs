//! SM-2 retention state and update rules

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Starting ease for an item that has never been reviewed
pub const DEFAULT_EASE: f64 = 2.5;

/// Ease floor; intervals never grow slower than this factor
pub const DEFAULT_MIN_EASE: f64 = 1.3;

/// Ease ceiling reached through successful reviews
pub const DEFAULT_MAX_EASE: f64 = 2.5;

/// Ease gained on a successful review
pub const SUCCESS_BONUS: f64 = 0.1;

/// Ease lost on a lapse
pub const LAPSE_PENALTY: f64 = 0.2;

/// Upper bound on any interval (100 years)
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

// ============================================================================
// CONFIG
// ============================================================================

/// Tuning knobs for the updater
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionConfig {
    /// Ease assigned to new items
    pub initial_ease: f64,
    /// Floor applied after lapses
    pub min_ease: f64,
    /// Ceiling applied after successes
    pub max_ease: f64,
    /// Ease added per success
    pub success_bonus: f64,
    /// Ease removed per lapse
    pub lapse_penalty: f64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            initial_ease: DEFAULT_EASE,
            min_ease: DEFAULT_MIN_EASE,
            max_ease: DEFAULT_MAX_EASE,
            success_bonus: SUCCESS_BONUS,
            lapse_penalty: LAPSE_PENALTY,
        }
    }
}

impl RetentionConfig {
    /// Check that the ease bounds are ordered and the nudges are non-negative
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("initial_ease", self.initial_ease),
            ("min_ease", self.min_ease),
            ("max_ease", self.max_ease),
            ("success_bonus", self.success_bonus),
            ("lapse_penalty", self.lapse_penalty),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(format!("{} must be finite, got {}", name, value));
        }
        if self.min_ease <= 0.0 {
            return Err(format!("min_ease must be positive, got {}", self.min_ease));
        }
        if self.min_ease > self.initial_ease || self.initial_ease > self.max_ease {
            return Err(format!(
                "ease bounds must satisfy min <= initial <= max, got {} <= {} <= {}",
                self.min_ease, self.initial_ease, self.max_ease
            ));
        }
        if self.success_bonus < 0.0 || self.lapse_penalty < 0.0 {
            return Err("ease nudges must be non-negative".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// STATE
// ============================================================================

/// Per-item scheduling state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionState {
    /// Interval growth factor
    pub ease: f64,
    /// Days between the last successful review and the next due date
    pub interval_days: u32,
    /// Consecutive successes since the last lapse
    pub repetitions: u32,
    /// Next due date; `None` for an item that was never reviewed
    pub next_due: Option<DateTime<Utc>>,
    /// Outcome of the most recent attempt
    pub last_result: Option<bool>,
}

impl Default for RetentionState {
    fn default() -> Self {
        Self::new(DEFAULT_EASE)
    }
}

impl RetentionState {
    /// State of a never-reviewed item
    pub fn new(initial_ease: f64) -> Self {
        Self {
            ease: initial_ease,
            interval_days: 0,
            repetitions: 0,
            next_due: None,
            last_result: None,
        }
    }

    /// Never reviewed
    pub fn is_new(&self) -> bool {
        self.next_due.is_none()
    }

    /// Due at `reference_time` (new items are not "due", they are new)
    pub fn is_due(&self, reference_time: DateTime<Utc>) -> bool {
        self.next_due.is_some_and(|due| due <= reference_time)
    }
}

/// Both possible outcomes of the next review
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPreview {
    pub on_correct: RetentionState,
    pub on_incorrect: RetentionState,
}

// ============================================================================
// UPDATER
// ============================================================================

/// Applies recall outcomes to retention state
#[derive(Debug, Clone, Default)]
pub struct RetentionUpdater {
    config: RetentionConfig,
}

impl RetentionUpdater {
    pub fn new(config: RetentionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// State for an item entering the store
    pub fn initial_state(&self) -> RetentionState {
        RetentionState::new(self.config.initial_ease)
    }

    /// Apply one recall outcome at `now`
    pub fn apply(&self, state: &RetentionState, correct: bool, now: DateTime<Utc>) -> RetentionState {
        // A never-reviewed item enters with no streak and no interval, whatever is stored
        let (repetitions, interval) = if state.is_new() {
            (0, 0)
        } else {
            (state.repetitions, state.interval_days)
        };
        let ease = state.ease.max(self.config.min_ease);

        let (ease, interval_days, repetitions) = if correct {
            let repetitions = repetitions.saturating_add(1);
            let ease = self.raise_ease(ease);
            let grown = match repetitions {
                1 => 1,
                2 => 6,
                _ => scale_interval(interval, ease),
            };
            (ease, grown.max(interval).clamp(1, MAX_INTERVAL_DAYS), repetitions)
        } else {
            let ease = (ease - self.config.lapse_penalty).max(self.config.min_ease);
            (ease, 1, 0)
        };

        RetentionState {
            ease,
            interval_days,
            repetitions,
            next_due: Some(now + Duration::days(i64::from(interval_days))),
            last_result: Some(correct),
        }
    }

    /// Both next states, without committing to either
    pub fn preview(&self, state: &RetentionState, now: DateTime<Utc>) -> RetentionPreview {
        RetentionPreview {
            on_correct: self.apply(state, true, now),
            on_incorrect: self.apply(state, false, now),
        }
    }

    /// Success nudge, capped at `max_ease`.
    ///
    /// With the default tuning the cap equals the initial ease, so the nudge
    /// only moves an item that lapsed earlier. An unbroken run of successes
    /// stays on the 1, 6, 15 day progression.
    fn raise_ease(&self, ease: f64) -> f64 {
        // An ease already above the ceiling (older tuning) is left alone: success never lowers it
        if ease >= self.config.max_ease {
            ease
        } else {
            (ease + self.config.success_bonus).min(self.config.max_ease)
        }
    }
}

fn scale_interval(interval: u32, ease: f64) -> u32 {
    let scaled = (f64::from(interval) * ease).round();
    if scaled >= f64::from(MAX_INTERVAL_DAYS) {
        MAX_INTERVAL_DAYS
    } else {
        scaled as u32
    }
}

/// Format an interval in days to a compact string
pub fn format_interval(days: u32) -> String {
    match days {
        0 => "now".to_string(),
        1..=6 => format!("{}d", days),
        7..=29 => format!("{}w", days / 7),
        30..=364 => format!("{}mo", days / 30),
        _ => format!("{}y", days / 365),
    }
}
