//! Retry with exponential backoff for transient storage failures

use std::time::Duration;

use tracing::warn;

use crate::storage::StorageError;

/// Backoff schedule for storage calls made by the session manager
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(50),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Fail on the first error
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Retry without sleeping
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::ZERO,
            multiplier: 1.0,
            max_backoff: Duration::ZERO,
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(delay.as_secs_f64() * self.multiplier).min(self.max_backoff)
    }
}

/// Run `op`, retrying transient failures per `policy`.
///
/// Non-transient errors return immediately. When retries run out the last
/// error is reported as [`StorageError::Unavailable`].
pub fn with_retry<T, F>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T, StorageError>
where
    F: FnMut() -> Result<T, StorageError>,
{
    let mut retry_count = 0;
    let mut delay = policy.initial_backoff;

    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => {
                if retry_count >= policy.max_retries {
                    return Err(StorageError::Unavailable(format!(
                        "{} failed after {} attempts: {}",
                        operation,
                        retry_count + 1,
                        e
                    )));
                }
                retry_count += 1;
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    operation,
                    retry_count,
                    policy.max_retries + 1,
                    delay,
                    e
                );
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                delay = policy.next_delay(delay);
            }
            Err(e) => return Err(e),
        }
    }
}
