//! Retry with exponential backoff for transport-level registry failures.
//!
//! Only `RegistryError::is_transient` errors are retried. Reverts, missing
//! entries and mismatches are outcomes, not glitches, and come back on the
//! first attempt.

use crate::errors::RegistryError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
    /// Upper bound of the random delay added on top of the backoff, as a
    /// fraction of it.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 200,
            max_delay_ms: 10_000,
            exponential_base: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Policy that gives up after the first failure.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay_ms(mut self, initial_delay_ms: u64) -> Self {
        self.initial_delay_ms = initial_delay_ms;
        self
    }

    /// Delay before retry number `attempt` (0-based): the capped backoff
    /// plus a random jitter of up to `jitter_factor` of it.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay_ms as f64 * self.exponential_base.powi(attempt as i32);
        let capped = base.min(self.max_delay_ms as f64) as u64;
        let max_jitter = (capped as f64 * self.jitter_factor.max(0.0)) as u64;
        let jitter = rand::thread_rng().gen_range(0..=max_jitter);
        Duration::from_millis(capped + jitter)
    }

    /// Run `f` until it succeeds, fails for good, or retries run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, RegistryError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RegistryError>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !error.is_transient() || attempt >= self.max_retries {
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt);
                    attempt += 1;
                    tracing::warn!(
                        operation = %operation,
                        attempt = attempt,
                        retries_left = self.max_retries - attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying registry call"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
