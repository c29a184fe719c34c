//! Retry policy for stale-connection failures

use std::future::Future;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::Result;

/// Retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay between attempts in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Fixed-delay retry for operations that hit a stale connection.
///
/// Only [`crate::Error::InvalidState`] is retried. Everything else is
/// returned to the caller on the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay_ms: delay.as_millis() as u64,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Run `op` until it succeeds, fails with a non-stale error, or the
    /// retries run out. The last error is returned on exhaustion.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries_left = self.max_retries;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_stale() && retries_left > 0 => {
                    retries_left -= 1;
                    tracing::warn!(
                        "{} hit a stale connection ({}), retrying in {}ms ({} left)",
                        label,
                        err,
                        self.delay_ms,
                        retries_left
                    );
                    tokio::time::sleep(self.delay()).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_policy_waits_between_attempts() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let started = tokio::time::Instant::now();

        let result = RetryPolicy::default()
            .run("op", move || async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= 2 {
                    Err(Error::InvalidState("closed".into()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert!(started.elapsed() < Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn test_recovers_after_two_stale_failures() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result = fast()
            .run("op", move || async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= 2 {
                    Err(Error::InvalidState("closed".into()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result: Result<()> = fast()
            .run("op", move || async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                Err(Error::InvalidState(format!("attempt {}", n)))
            })
            .await;

        assert_eq!(counter.load(Ordering::SeqCst), 4);
        match result {
            Err(Error::InvalidState(msg)) => assert_eq!(msg, "attempt 4"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_terminal_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result: Result<()> = fast()
            .run("op", move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(Error::QuotaExceeded("disk full".into()))
            })
            .await;

        assert!(matches!(result, Err(Error::QuotaExceeded(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
