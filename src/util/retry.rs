//! Retry with exponential backoff.
//!
//! The only place in the crate that sleeps. Delays are exact (no jitter), so a
//! policy with `initial_backoff = D0`, `multiplier = B` and `max_backoff = Dmax`
//! sleeps `D0`, then `min(D0 * B, Dmax)`, and so on.

use std::future::Future;
use std::time::Duration;

use crate::error::OmniError;

/// Statuses retried by default: request timeout, throttling, and the 5xx family.
pub const DEFAULT_RETRY_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
    /// Statuses that are worth another attempt.
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
            multiplier: 2.0,
            retry_on_status: DEFAULT_RETRY_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Whether `error` should trigger another attempt under this policy.
    ///
    /// Connection failures carry no status and are always retried.
    pub fn should_retry(&self, error: &OmniError) -> bool {
        match error {
            OmniError::ConnectionFailure(_) => true,
            other => other
                .status()
                .map(|status| self.retry_on_status.contains(&status))
                .unwrap_or(false),
        }
    }

    /// Delay to use after the one just slept.
    pub fn next_backoff(&self, current: Duration) -> Duration {
        let next = current.as_secs_f64() * self.multiplier;
        Duration::from_secs_f64(next.min(self.max_backoff.as_secs_f64()).max(0.0))
    }

    /// Execute an async operation with retry.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, OmniError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OmniError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff.min(self.max_backoff);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !self.should_retry(&e) || attempt >= max_attempts {
                        return Err(e);
                    }

                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retrying after error"
                    );

                    tokio::time::sleep(backoff).await;
                    backoff = self.next_backoff(backoff);
                }
            }
        }
    }
}
