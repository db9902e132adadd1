//! Bounded retry with exponential backoff for store operations.
//!
//! One explicit policy value applied at call sites. Only transient error
//! kinds are re-attempted; validation and schema errors propagate
//! immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::StoreError;

/// Retry policy: bounded attempts with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// Up to 3 attempts, 1 s initial delay, doubling, capped at 10 s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits, for tests.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            multiplier: 1,
            max_delay: Duration::ZERO,
        }
    }

    /// Run `attempt` until it succeeds, fails permanently, or the attempt
    /// budget is exhausted.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut delay = self.initial_delay;
        let mut tries = 0;

        loop {
            tries += 1;
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && tries < self.max_attempts => {
                    warn!(
                        operation,
                        attempt = tries,
                        max = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient store failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * self.multiplier).min(self.max_delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> StoreError {
        StoreError::Timeout {
            operation: "upsert_signal",
        }
    }

    fn permanent() -> StoreError {
        StoreError::Schema("missing column last_update".into())
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);
        let result = policy
            .run("upsert_signal", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(transient())
                    } else {
                        Ok(7_i64)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);
        let result: Result<(), _> = policy
            .run("update_strategy_execution", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(permanent()) }
            })
            .await;
        assert!(matches!(result, Err(StoreError::Schema(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn attempt_budget_is_bounded() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);
        let result: Result<(), _> = policy
            .run("read_recent_outcomes", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
