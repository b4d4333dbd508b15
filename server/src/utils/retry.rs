//! Async retry utilities with exponential backoff

use std::time::Duration;

use crate::core::constants::{DEFAULT_TOOL_RETRY_ATTEMPTS, DEFAULT_TOOL_RETRY_BASE_DELAY_MS};

/// Retry policy for a single operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_TOOL_RETRY_ATTEMPTS,
            base_delay_ms: DEFAULT_TOOL_RETRY_BASE_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
        }
    }

    /// Backoff before attempt `attempt + 1` (attempt is 1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Retry an async operation with exponential backoff.
///
/// Only errors for which `is_transient` returns true are retried; any other
/// error is returned immediately. Returns `Ok((value, attempts))` on success,
/// or `Err((error, attempts))` on failure.
pub async fn retry_with_backoff_async<F, Fut, T, E, P>(
    policy: RetryPolicy,
    is_transient: P,
    mut operation: F,
) -> Result<(T, u32), (E, u32)>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => return Ok((value, attempts)),
            Err(e) => {
                if attempts >= policy.max_attempts || !is_transient(&e) {
                    return Err((e, attempts));
                }
                let delay = policy.delay_after(attempts);
                tracing::warn!(
                    error = %e,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_success_on_first_try() {
        let result =
            retry_with_backoff_async(RetryPolicy::new(3, 10), |_: &&str| true, || async {
                Ok::<_, &str>(7)
            })
            .await;
        assert_eq!(result, Ok((7, 1)));
    }

    #[tokio::test]
    async fn test_success_after_retry() {
        let attempts = AtomicU32::new(0);
        let result = retry_with_backoff_async(RetryPolicy::new(3, 10), |_: &&str| true, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 2 {
                    Err("transient error")
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok((2, 2)));
    }

    #[tokio::test]
    async fn test_failure_after_max_retries() {
        let result = retry_with_backoff_async(RetryPolicy::new(3, 10), |_: &&str| true, || async {
            Err::<(), _>("persistent error")
        })
        .await;
        let (error, attempts) = result.unwrap_err();
        assert_eq!(error, "persistent error");
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff_async(RetryPolicy::new(5, 10), |_: &&str| false, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("not found") }
        })
        .await;
        assert_eq!(result.unwrap_err().1, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::new(4, 100);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, 10).max_attempts, 1);
    }
}
