//! Outer retry loop for transient failures.

use std::{future::Future, time::Duration};

use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};

use crate::DeployError;

/// Bounded exponential backoff for retryable failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts, the first one included.
    pub max_attempts: usize,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Never retry.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.min_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_max_times(self.max_attempts.saturating_sub(1))
    }
}

/// Run `op`, retrying it while it fails with a retryable [`DeployError`].
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    op: F,
) -> Result<T, DeployError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DeployError>>,
{
    op.retry(config.backoff())
        .sleep(tokio::time::sleep)
        .when(DeployError::is_retryable)
        .notify(|err, delay| {
            tracing::warn!(
                operation,
                error = %err,
                category = %err.category(),
                delay_ms = delay.as_millis() as u64,
                "Retrying after transient failure..."
            );
        })
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn fast(max_attempts: usize) -> RetryConfig {
        RetryConfig {
            max_attempts,
            min_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_up_to_the_bound() {
        let attempts = AtomicUsize::new(0);
        let err = with_retry::<(), _, _>(&fast(3), "test", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(DeployError::Network("connection refused".into()))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, DeployError::Network(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_failures_are_not_retried() {
        let attempts = AtomicUsize::new(0);
        let err = with_retry::<(), _, _>(&fast(5), "test", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(DeployError::UnboundApprovalProcess {
                process_id: "proc-1".into(),
            })
        })
        .await
        .unwrap_err();

        assert!(matches!(err, DeployError::UnboundApprovalProcess { .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let attempts = AtomicUsize::new(0);
        let value = with_retry(&fast(3), "test", || async {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DeployError::Network("reset".into()))
            } else {
                Ok(42)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disabled() {
        assert_eq!(RetryConfig::disabled().max_attempts, 1);
    }
}
