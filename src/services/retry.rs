// src/services/retry.rs

//! Bounded retry with increasing backoff.
//!
//! Whether an error is worth another attempt is decided by the error type
//! itself through [`Retryable`]; the policy only counts attempts and waits.

use std::future::Future;
use std::time::Duration;

use crate::error::{FetchError, FetchErrorKind, NotifyError, NotifyErrorKind};

/// Errors that know whether a retry can help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;

    /// Server-provided wait hint, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        !matches!(self.kind, FetchErrorKind::UnexpectedStatus)
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

impl Retryable for NotifyError {
    fn is_retryable(&self) -> bool {
        !matches!(
            self.kind,
            NotifyErrorKind::InvalidTarget | NotifyErrorKind::Rejected
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

/// Attempt limit and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    /// Wait after the first failure; grows linearly per attempt
    pub base_delay: Duration,
    /// Upper bound for any single wait
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Wait before the attempt following failed attempt number `attempt` (1-based).
    ///
    /// A server hint replaces the computed delay but is still capped.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let computed = self.base_delay.saturating_mul(attempt);
        hint.unwrap_or(computed).min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Returns the last error on failure.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => {
                    log::error!("{label}: {err} (not retryable)");
                    return Err(err);
                }
                Err(err) if attempt >= self.max_attempts => {
                    log::error!(
                        "{label}: {err}. Giving up after {attempt}/{} attempts",
                        self.max_attempts
                    );
                    return Err(err);
                }
                Err(err) => {
                    let wait = self.delay_for(attempt, err.retry_after());
                    log::warn!(
                        "{label}: {err}. Attempt {attempt}/{}, retrying in {:?}",
                        self.max_attempts,
                        wait
                    );
                    if !wait.is_zero() {
                        tokio::time::sleep(wait).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(10), Duration::from_secs(120))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_delay_grows_linearly_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_secs(10), Duration::from_secs(25));
        assert_eq!(policy.delay_for(1, None), Duration::from_secs(10));
        assert_eq!(policy.delay_for(2, None), Duration::from_secs(20));
        assert_eq!(policy.delay_for(3, None), Duration::from_secs(25));
    }

    #[test]
    fn test_hint_overrides_but_is_capped() {
        let policy = RetryPolicy::new(3, Duration::from_secs(10), Duration::from_secs(30));
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(600))),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), FetchError> = instant(3)
            .run("fetch", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::new(FetchErrorKind::RateLimited, "HTTP 429"))
            })
            .await;

        assert_eq!(result.unwrap_err().kind, FetchErrorKind::RateLimited);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = instant(3)
            .run("fetch", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(FetchError::new(FetchErrorKind::Timeout, "deadline"))
                } else {
                    Ok("page")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "page");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), NotifyError> = instant(5)
            .run("notify", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(NotifyError::new(NotifyErrorKind::InvalidTarget, "chat not found"))
            })
            .await;

        assert!(result.unwrap_err().is_fatal());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unexpected_status_not_retried() {
        let calls = AtomicU32::new(0);
        let _: Result<(), FetchError> = instant(3)
            .run("fetch", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::new(FetchErrorKind::UnexpectedStatus, "HTTP 404"))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
