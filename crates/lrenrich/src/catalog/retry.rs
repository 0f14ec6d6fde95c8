//! Bounded exponential backoff around catalog lock contention.

use std::time::Duration;

use rusqlite::ErrorCode;
use tracing::warn;

use super::DatabaseError;

/// One initial call plus up to `retries` more, sleeping `base_delay * 2^n`
/// after the n-th failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        Self {
            retries,
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay after the failed attempt with zero-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }

    /// Every delay a fully exhausted call sleeps through, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.retries).map(|attempt| self.delay_for(attempt)).collect()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

pub fn is_lock_contention(error: &rusqlite::Error) -> bool {
    matches!(
        error.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
    )
}

/// Runs `op`, retrying only lock contention, sleeping with `std::thread::sleep`.
pub fn retry_on_lock<T, F>(policy: &RetryPolicy, op: F) -> Result<T, DatabaseError>
where
    F: FnMut(u32) -> Result<T, DatabaseError>,
{
    retry_on_lock_with(policy, std::thread::sleep, op)
}

/// Same as [`retry_on_lock`] with an injectable sleep.
pub fn retry_on_lock_with<T, F, S>(
    policy: &RetryPolicy,
    mut sleep: S,
    mut op: F,
) -> Result<T, DatabaseError>
where
    F: FnMut(u32) -> Result<T, DatabaseError>,
    S: FnMut(Duration),
{
    let mut attempt = 0;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(DatabaseError::Sqlite(error)) if is_lock_contention(&error) => {
                let made = attempt + 1;
                if attempt >= policy.retries {
                    return Err(DatabaseError::RetriesExhausted {
                        attempts: made,
                        source: error,
                    });
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    retry = made,
                    retries = policy.retries,
                    delay_ms = delay.as_millis() as u64,
                    "Catalog locked, retrying: {}",
                    error
                );
                sleep(delay);
                attempt = made;
            }
            Err(other) => return Err(other),
        }
    }
}
