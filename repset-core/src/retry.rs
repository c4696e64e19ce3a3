//! Bounded retry with backoff for backend calls.

use std::future::Future;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::time::sleep;

use crate::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before attempt `n + 1` is `step * n`.
    pub step: Duration,
}

impl RetryPolicy {
    pub const fn linear(max_attempts: u32, step: Duration) -> Self {
        Self { max_attempts, step }
    }

    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            step: Duration::ZERO,
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt)
    }
}

/// Error returned once a retried operation gives up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryError {
    pub attempts: u32,
    pub last: BackendError,
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the
/// policy runs out of attempts.
pub async fn with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        debug!("{} attempt={} max_attempts={}", label, attempt, max_attempts);
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt={}", label, attempt);
                }
                return Ok(value);
            }
            Err(e) if !e.is_transient() => {
                warn!("{} failed permanently on attempt {}: {}", label, attempt, e);
                return Err(RetryError { attempts: attempt, last: e });
            }
            Err(e) => {
                warn!("{} failed on attempt {}: {}", label, attempt, e);
                if attempt >= max_attempts {
                    error!("{} exhausted attempts={}", label, attempt);
                    return Err(RetryError { attempts: attempt, last: e });
                }
                let delay = policy.delay_after(attempt);
                if !delay.is_zero() {
                    debug!("{} sleeping ms={} before next attempt", label, delay.as_millis());
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn linear_delays_grow_with_attempt() {
        let policy = RetryPolicy::linear(3, Duration::from_millis(1000));
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(RetryPolicy::immediate(3), "test", |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(BackendError::Transient("flaky".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_stop_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(RetryPolicy::immediate(3), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BackendError::Unauthorized) }
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(err.last, BackendError::Unauthorized);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts_with_linear_backoff() {
        let started = tokio::time::Instant::now();
        let result: Result<(), _> = with_backoff(
            RetryPolicy::linear(3, Duration::from_millis(1000)),
            "test",
            |_| async { Err(BackendError::Transient("down".into())) },
        )
        .await;
        assert_eq!(result.unwrap_err().attempts, 3);
        // 1000ms after the first failure, 2000ms after the second.
        assert_eq!(started.elapsed(), Duration::from_millis(3000));
    }
}
