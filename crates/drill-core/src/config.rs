//! Engine configuration
//!
//! Defaults are usable as-is. `EngineConfig::from_env` overrides them from
//! `DRILL_*` environment variables; unparsable values fall back to defaults.

use std::str::FromStr;

use crate::retention::RetentionConfig;
use crate::scheduler::SchedulerConfig;
use crate::session::RetryPolicy;

/// Upper bound on a session's requested size
pub const DEFAULT_MAX_SESSION_LIMIT: usize = 100;

/// How long ended sessions stay in memory before pruning
pub const DEFAULT_SESSION_RETENTION_HOURS: i64 = 24;

/// How long an active session may go without an attempt before it is abandoned
pub const DEFAULT_SESSION_IDLE_MINUTES: i64 = 120;

/// Everything the session manager needs to know
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub retention: RetentionConfig,
    pub scheduler: SchedulerConfig,
    pub retry: RetryPolicy,
    /// Largest `limit` accepted when starting a session
    pub max_session_limit: usize,
    /// Age after which finished sessions are dropped from memory
    pub ended_session_retention: chrono::Duration,
    /// Inactivity after which an active session is ended and dropped
    pub idle_session_timeout: chrono::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention: RetentionConfig::default(),
            scheduler: SchedulerConfig::default(),
            retry: RetryPolicy::default(),
            max_session_limit: DEFAULT_MAX_SESSION_LIMIT,
            ended_session_retention: chrono::Duration::hours(DEFAULT_SESSION_RETENTION_HOURS),
            idle_session_timeout: chrono::Duration::minutes(DEFAULT_SESSION_IDLE_MINUTES),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    /// Defaults overridden by `DRILL_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let retention = RetentionConfig {
            initial_ease: env_or("DRILL_INITIAL_EASE", defaults.retention.initial_ease),
            min_ease: env_or("DRILL_MIN_EASE", defaults.retention.min_ease),
            max_ease: env_or("DRILL_MAX_EASE", defaults.retention.max_ease),
            ..defaults.retention
        };

        let scheduler = SchedulerConfig {
            max_new_per_session: env_or(
                "DRILL_MAX_NEW_PER_SESSION",
                defaults.scheduler.max_new_per_session,
            ),
        };

        let retry = RetryPolicy {
            max_retries: env_or("DRILL_STORAGE_RETRIES", defaults.retry.max_retries),
            ..defaults.retry
        };

        let retention_hours = env_or("DRILL_SESSION_RETENTION_HOURS", DEFAULT_SESSION_RETENTION_HOURS);
        let idle_minutes = env_or("DRILL_SESSION_IDLE_MINUTES", DEFAULT_SESSION_IDLE_MINUTES);

        Self {
            retention,
            scheduler,
            retry,
            max_session_limit: env_or("DRILL_MAX_SESSION_LIMIT", defaults.max_session_limit),
            ended_session_retention: chrono::Duration::hours(retention_hours.max(0)),
            idle_session_timeout: chrono::Duration::minutes(idle_minutes),
        }
    }

    /// Reject configurations the engine cannot honour
    pub fn validate(&self) -> Result<(), String> {
        self.retention.validate()?;
        if self.max_session_limit == 0 {
            return Err("max_session_limit must be at least 1".to_string());
        }
        if self.idle_session_timeout <= chrono::Duration::zero() {
            return Err(format!(
                "idle session timeout must be positive, got {} minutes",
                self.idle_session_timeout.num_minutes()
            ));
        }
        if self.retry.multiplier < 1.0 {
            return Err(format!(
                "retry multiplier must be >= 1.0, got {}",
                self.retry.multiplier
            ));
        }
        Ok(())
    }
}
