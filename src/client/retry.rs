//! Exponential backoff with jitter around a fallible async call.
//!
//! [`with_retry`] re-runs an operation while it fails with a retryable
//! [`ApiError`], sleeping for [`RetryPolicy::delay_for`] between attempts.
//! Delays come from an [`exponential_backoff::Backoff`] built from the policy.

use std::future::Future;
use std::time::Duration;

use exponential_backoff::Backoff;
use tracing::{debug, warn};

use super::error::ApiError;

/// Default number of attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default ceiling for a single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8);

/// Default jitter fraction.
pub const DEFAULT_JITTER: f32 = 0.2;

/// Highest retry number fed to the backoff curve. Far beyond any cap.
const MAX_EXPONENT: u32 = 16;

/// Retry policy for alert API calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,

    /// Minimum delay of the backoff curve; doubled for each retry.
    pub base_delay: Duration,

    /// Upper bound on a single delay.
    pub max_delay: Duration,

    /// Random spread as a fraction of the computed delay, in `(0, 1)`.
    pub jitter: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl RetryPolicy {
    /// The backoff curve described by this policy.
    ///
    /// Attempt counting stays with [`with_retry`], so the curve itself never
    /// runs out of retries.
    pub fn backoff(&self) -> Backoff {
        let max = self.max_delay.max(Duration::from_millis(1));
        let min = self.base_delay.max(Duration::from_millis(1)).min(max);

        let mut backoff = Backoff::new(u32::MAX, min, Some(max));
        backoff.set_factor(2);
        backoff.set_jitter(self.jitter.clamp(0.01, 0.99));
        backoff
    }

    /// Delay before retry number `retry` (1-based), jittered and capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff()
            .next(retry.clamp(1, MAX_EXPONENT))
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are exhausted.
///
/// The final error is returned unchanged, so a caller sees the same class
/// whether or not retries happened.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Alert API call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_retryable() {
                    warn!(operation, attempts, error = %err, "Alert API call failed after retries");
                } else {
                    debug!(operation, attempt, error = %err, "Alert API call failed");
                }
                return Err(err);
            }
        }
    }
}
