//! Bounded retry with a fixed backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Result of a retried operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<T, E> {
    /// The operation succeeded on attempt `attempts` (1-based).
    Succeeded { value: T, attempts: u32 },
    /// Every attempt failed; carries the last error.
    Exhausted { last_error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Retry policy: up to `max_attempts` tries, sleeping `backoff` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Run `op` until it succeeds or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. No sleep follows the final
    /// attempt.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> RetryOutcome<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => {
                    return RetryOutcome::Succeeded {
                        value,
                        attempts: attempt,
                    }
                }
                Err(e) if attempt >= max_attempts => {
                    return RetryOutcome::Exhausted {
                        last_error: e,
                        attempts: attempt,
                    }
                }
                Err(e) => {
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let start = tokio::time::Instant::now();

        let outcome = policy
            .run("flaky", |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("boom")
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(outcome, RetryOutcome::Succeeded { value: 2, attempts: 3 });
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_without_trailing_sleep() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let start = tokio::time::Instant::now();

        let outcome: RetryOutcome<(), String> = policy
            .run("down", |attempt| async move { Err(format!("attempt {}", attempt)) })
            .await;

        assert_eq!(outcome.attempts(), 3);
        assert_eq!(
            outcome,
            RetryOutcome::Exhausted {
                last_error: "attempt 3".to_string(),
                attempts: 3
            }
        );
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        let outcome: RetryOutcome<u8, &str> = policy.run("once", |_| async { Ok(7) }).await;
        assert_eq!(outcome.attempts(), 1);
    }
}
