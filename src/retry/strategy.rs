// src/retry/strategy.rs

use crate::config::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Bounded retry of a fallible async operation.
///
/// `max_attempts` counts the first try, so a value of 2 means one retry.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    config: RetryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

impl RetryStrategy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Run `f` until it succeeds, `classify` rejects the error, or the
    /// attempt budget is spent. The last error is returned unchanged.
    pub async fn run<F, Fut, T, E>(
        &self,
        mut f: F,
        classify: impl Fn(&E) -> RetryDecision,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let budget = self.max_attempts();
        let mut attempt = 1;

        loop {
            let error = match f().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if classify(&error) == RetryDecision::NoRetry {
                debug!("Attempt {} failed with a non-retryable error: {}", attempt, error);
                return Err(error);
            }
            if attempt >= budget {
                warn!("Giving up after {} attempts: {}", attempt, error);
                return Err(error);
            }

            let delay = self.delay_before(attempt + 1);
            debug!("Attempt {} failed: {}; next attempt in {:?}", attempt, error, delay);
            if !delay.is_zero() {
                sleep(delay).await;
            }
            attempt += 1;
        }
    }

    /// Delay before `attempt` (2 or later): doubling from the base, capped,
    /// plus up to a quarter of jitter.
    fn delay_before(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base();
        if base.is_zero() {
            return Duration::ZERO;
        }

        let doublings = attempt.saturating_sub(2).min(31);
        let delay = base
            .saturating_mul(1u32 << doublings)
            .min(self.config.backoff_max());

        delay.mul_f64(1.0 + rand::thread_rng().gen_range(0.0..0.25))
    }
}
