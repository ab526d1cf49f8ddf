//! Bounded retry with linear backoff.

use crate::error::BackupError;
use std::future::Future;
use std::time::Duration;
use tokio_retry2::{Retry, RetryError};
use tracing::warn;

/// How often an operation is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Attempt `n` waits `n * backoff_unit` after failing.
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    /// Delays slept between consecutive attempts: `unit, 2*unit, ...`.
    ///
    /// Yields `max_attempts - 1` values, one per retry.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let unit = self.backoff_unit;
        (1..self.max_attempts).map(move |attempt| unit * attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(50, Duration::from_secs(10))
    }
}

/// Runs `op` until it succeeds or `policy` is exhausted.
///
/// `op` receives the 1-based attempt number. After the last failure the
/// error is wrapped in [`BackupError::RetriesExhausted`] with `context`.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, context: &str, mut op: F) -> Result<T, BackupError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, BackupError>>,
{
    let max_attempts = policy.max_attempts;
    let mut attempts = 0u32;

    let result = Retry::spawn(policy.delays(), || {
        attempts += 1;
        let attempt = attempts;
        let fut = op(attempt);
        async move {
            match fut.await {
                Ok(value) => Ok(value),
                Err(e) => {
                    warn!(
                        "{}: attempt {}/{} failed: {}",
                        context, attempt, max_attempts, e
                    );
                    RetryError::to_transient(e)
                }
            }
        }
    })
    .await;

    result.map_err(|e| BackupError::RetriesExhausted {
        context: context.to_string(),
        attempts,
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy::new(5, Duration::from_secs(10));
        let delays: Vec<Duration> = policy.delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(10),
                Duration::from_secs(20),
                Duration::from_secs(30),
                Duration::from_secs(40),
            ]
        );
    }

    #[test]
    fn test_reference_policy_delays_strictly_increase() {
        let delays: Vec<Duration> = RetryPolicy::default().delays().collect();
        assert_eq!(delays.len(), 49);
        assert!(delays.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delays().count(), 0);
    }

    #[tokio::test]
    async fn test_permanent_failure_uses_every_attempt() {
        let policy = RetryPolicy::new(4, Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let err = retry(&policy, "upload part-1", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(BackupError::InvalidConfig("nope".to_string())) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match err {
            BackupError::RetriesExhausted {
                context,
                attempts,
                source,
            } => {
                assert_eq!(context, "upload part-1");
                assert_eq!(attempts, 4);
                assert!(matches!(*source, BackupError::InvalidConfig(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));

        let value = retry(&policy, "upload part-2", |attempt| async move {
            if attempt < 3 {
                Err(BackupError::InvalidConfig("flaky".to_string()))
            } else {
                Ok(attempt)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
    }
}
