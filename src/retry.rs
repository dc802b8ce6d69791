//! Per-record retry protocol with linear backoff
//!
//! A record gets up to `max_attempts` attempts. After a failed attempt `n`
//! the next one starts `n × backoff_unit` later; failing the last attempt is
//! terminal.
//!
//! # Example
//!
//! ```no_run
//! use memories_dl::config::RetryConfig;
//! use memories_dl::retry::{RetryPolicy, run_with_retry};
//!
//! # async fn example() -> memories_dl::Result<()> {
//! let policy = RetryPolicy::from_config(&RetryConfig::default());
//! let (value, attempt) = run_with_retry(&policy, "2023-05-01_10-00-00", |attempt| async move {
//!     // Your operation here
//!     Ok::<_, memories_dl::Error>(attempt * 10)
//! })
//! .await?;
//! assert_eq!((value, attempt), (10, 1));
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;

/// Where a record is in its attempt chain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptState {
    /// Attempt `n` (1-based) is running or about to run
    Attempt(u32),
    /// An attempt completed without error
    Success,
    /// The last allowed attempt failed
    PermanentFailure,
}

/// Attempt budget and backoff of the retry protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_unit: Duration,
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` is clamped to at least 1
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    /// Policy from the retry section of the configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.backoff_unit)
    }

    /// Attempts allowed per record
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Initial state of every record
    pub fn start(&self) -> AttemptState {
        AttemptState::Attempt(1)
    }

    /// State after the current attempt succeeded
    pub fn on_success(&self, _state: AttemptState) -> AttemptState {
        AttemptState::Success
    }

    /// State after the current attempt failed
    pub fn on_failure(&self, state: AttemptState) -> AttemptState {
        match state {
            AttemptState::Attempt(n) if n < self.max_attempts => AttemptState::Attempt(n + 1),
            AttemptState::Attempt(_) => AttemptState::PermanentFailure,
            terminal => terminal,
        }
    }

    /// Pause before the attempt following failed attempt `n`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Drive `operation` through the attempt chain of `policy`
///
/// `operation` receives the 1-based attempt number. Returns the first
/// successful value with the attempt that produced it, or the error of the
/// final attempt.
pub async fn run_with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    key: &str,
    mut operation: F,
) -> Result<(T, u32), E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut state = policy.start();
    let mut attempt = 1;
    let mut result = operation(attempt).await;

    loop {
        state = match &result {
            Ok(_) => policy.on_success(state),
            Err(_) => policy.on_failure(state),
        };

        match state {
            AttemptState::Attempt(next) => {
                let delay = policy.delay_after(attempt);
                if let Err(e) = &result {
                    tracing::warn!(
                        key,
                        error = %e,
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "attempt failed, retrying"
                    );
                }
                tokio::time::sleep(delay).await;
                attempt = next;
                result = operation(attempt).await;
            }
            AttemptState::Success => {
                if attempt > 1 {
                    tracing::info!(key, attempt, "record succeeded after retry");
                }
                return result.map(|value| (value, attempt));
            }
            AttemptState::PermanentFailure => {
                if let Err(e) = &result {
                    tracing::error!(
                        key,
                        error = %e,
                        attempts = attempt,
                        "record failed after all attempts"
                    );
                }
                return result.map(|value| (value, attempt));
            }
        }
    }
}
