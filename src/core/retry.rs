//! Retry policy
//!
//! Exponential backoff with optional jitter. Callers decide per attempt
//! whether the outcome is final, so the same policy serves both error
//! retries and "nothing claimed, try again" loops.

use crate::config::RetryConfig;
use crate::domain::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Outcome of a single attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    /// Final result; stop retrying
    Done(T),
    /// Worth another attempt. If attempts run out, this value is returned.
    Retry(T),
}

/// Retry policy with exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: usize,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
}

impl RetryPolicy {
    /// Create a policy
    ///
    /// `max_attempts` counts the first try; values below 1 are raised to 1.
    pub fn new(
        max_attempts: usize,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
            multiplier: multiplier.max(1.0),
            jitter: true,
        }
    }

    /// Policy that retries without sleeping, for tests
    pub fn immediate(max_attempts: usize) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO, 1.0).with_jitter(false)
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self::immediate(1)
    }

    /// Build from the `[extraction.retry]` section
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries + 1,
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.backoff_multiplier,
        )
    }

    /// Enable or disable random jitter on each delay
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay before retry number `retry` (1 for the first retry)
    ///
    /// Without jitter this is `initial_delay * multiplier^(retry - 1)`, capped
    /// at `max_delay`. Jitter adds up to a quarter of the delay, still capped.
    pub fn delay_for(&self, retry: usize) -> Duration {
        if retry == 0 || self.initial_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let base_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);

        let delay_ms = if self.jitter && capped_ms >= 4.0 {
            let extra = rand::thread_rng().gen_range(0.0..capped_ms / 4.0);
            (capped_ms + extra).min(self.max_delay.as_millis() as f64)
        } else {
            capped_ms
        };

        Duration::from_millis(delay_ms as u64)
    }

    /// Run `operation` until it returns [`Attempt::Done`], an error, or the
    /// attempts run out
    ///
    /// The closure receives the 1-based attempt number. Errors are returned
    /// immediately; only `Attempt::Retry` outcomes are retried.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<Attempt<T>>>,
    {
        let mut attempt = 1;
        loop {
            match f(attempt).await? {
                Attempt::Done(value) => return Ok(value),
                Attempt::Retry(value) => {
                    if attempt >= self.max_attempts {
                        tracing::warn!(
                            operation = operation,
                            attempts = attempt,
                            "Retry attempts exhausted"
                        );
                        return Ok(value);
                    }

                    crate::log_retry_attempt!(attempt, self.max_attempts, operation);

                    let delay = self.delay_for(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
