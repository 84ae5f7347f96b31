//! Centralized remote-call retry loop.
//!
//! Every extraction and job-polling HTTP path goes through
//! [`retry_with_backoff`], parameterized only by the backoff policy; the
//! retryable-condition predicate is [`crate::Error::is_retryable`].

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub base: Duration,
    pub cap: Duration,
    pub factor: f64,
}

impl BackoffPolicy {
    /// The policy individual remote HTTP calls use: up to 2 retries,
    /// 0.5s base, doubling, capped at 8s.
    #[must_use]
    pub fn remote_call() -> Self {
        Self {
            max_retries: 2,
            base: Duration::from_millis(500),
            cap: Duration::from_secs(8),
            factor: 2.0,
        }
    }

    /// The job-poll cadence: 1.0s base, factor 1.5, capped at 8s.
    #[must_use]
    pub fn job_poll() -> Self {
        Self {
            max_retries: 0,
            base: Duration::from_secs(1),
            cap: Duration::from_secs(8),
            factor: 1.5,
        }
    }

    /// Delay before attempt `attempt` (0-based counts the first retry).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let scaled = self.base.as_secs_f64() * self.factor.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.cap.as_secs_f64()))
    }
}

/// Run `operation`, retrying on retryable failures per `policy`.
///
/// Non-retryable errors propagate immediately; the last error is returned
/// once retries are exhausted.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: BackoffPolicy,
    op_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay(attempt);
                tracing::warn!(
                    operation = op_name,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retryable failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let policy = BackoffPolicy {
            max_retries: 2,
            base: Duration::from_millis(1),
            cap: Duration::from_millis(2),
            factor: 2.0,
        };
        let out = retry_with_backoff(policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::network("flaky"))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_propagates_immediately() {
        let calls = AtomicU32::new(0);
        let result: crate::Result<()> =
            retry_with_backoff(BackoffPolicy::remote_call(), "test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::api(400, "bad request")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn poll_backoff_grows_and_caps() {
        let policy = BackoffPolicy::job_poll();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_millis(1500));
        assert_eq!(policy.delay(20), Duration::from_secs(8));
    }
}
