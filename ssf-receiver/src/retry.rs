//! Backoff for the background poll loop.
//!
//! Only [`PollFailurePolicy::Retry`](crate::PollFailurePolicy::Retry) uses
//! this. Transient poll failures (timeouts, connection errors, 5xx and 429)
//! are retried with exponential backoff; everything else ends the loop on
//! the first attempt.

use crate::{SsfError, SsfResult};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Backoff settings for retried polls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first failed poll
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Add up to 25% random delay
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Set the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retry.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay cap.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Disable jitter.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }
}

/// Retries transient poll failures within a fixed budget.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a policy from backoff settings.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Delay before retry number `attempt` (zero-based): exponential in
    /// `attempt`, capped at `max_delay`, plus jitter when enabled.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub(crate) fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let base_ms =
            self.config.initial_delay.as_millis() as f64 * self.config.multiplier.powi(exponent);
        let capped_ms = base_ms.min(self.config.max_delay.as_millis() as f64);

        let delay_ms = if self.config.jitter {
            capped_ms * (1.0 + rand::random::<f64>() * 0.25)
        } else {
            capped_ms
        };
        Duration::from_millis(delay_ms as u64)
    }

    pub(crate) fn should_retry(&self, error: &SsfError, attempt: u32) -> bool {
        attempt < self.config.max_retries && error.is_retryable()
    }

    /// Run one poll exchange, retrying transient failures.
    ///
    /// Returns the first success, the first non-retryable error, or the
    /// last error once the budget is spent.
    pub(crate) async fn retry_poll<T, F, Fut>(&self, mut poll: F) -> SsfResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SsfResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match poll().await {
                Ok(batch) => return Ok(batch),
                Err(e) if self.should_retry(&e, attempt) => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis(),
                        "Poll failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        error!(error = %e, retries = attempt, "Poll retry budget exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}
