//! Finality waits.
//!
//! A deployment is final once its address has code. When the transaction hash is
//! known the receipt is awaited first so a revert is reported as such instead of
//! as a timeout.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};

use crate::{ChainClient, DeployError, PendingTarget, TransactionReceipt};

/// Default time to wait for finality, in seconds.
pub const DEFAULT_FINALITY_TIMEOUT_SECS: u64 = 300;

/// Default delay between two chain queries, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Polling parameters for finality waits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalityConfig {
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for FinalityConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_FINALITY_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl FinalityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Poll `check` until it yields a value or the configured timeout elapses.
///
/// Retryable errors (transport hiccups) are logged and polling continues; any
/// other error aborts the wait.
pub async fn poll_until<T, F, Fut>(
    target: PendingTarget,
    config: &FinalityConfig,
    check: F,
) -> Result<T, DeployError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Option<T>, DeployError>>,
{
    let start = tokio::time::Instant::now();
    let max_duration = config.timeout();

    tracing::debug!(%target, timeout_secs = config.timeout_secs, "Waiting for finality...");

    loop {
        match check().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {
                tracing::trace!(%target, "Not final yet, retrying...");
            }
            Err(e) if e.is_retryable() => {
                tracing::trace!(error = %e, %target, "Finality check failed, retrying...");
            }
            Err(e) => return Err(e),
        }

        if start.elapsed() >= max_duration {
            return Err(DeployError::FinalityTimeout {
                target,
                timeout_secs: config.timeout_secs,
            });
        }

        tokio::time::sleep(config.poll_interval()).await;
    }
}

/// Wait for the receipt of `tx_hash`.
pub async fn wait_for_receipt<C: ChainClient>(
    chain: &C,
    tx_hash: B256,
    config: &FinalityConfig,
) -> Result<TransactionReceipt, DeployError> {
    poll_until(PendingTarget::Transaction(tx_hash), config, || {
        chain.receipt(tx_hash)
    })
    .await
}

/// Wait until `address` has non-empty code and return it.
pub async fn wait_for_code<C: ChainClient>(
    chain: &C,
    address: Address,
    config: &FinalityConfig,
) -> Result<Bytes, DeployError> {
    poll_until(PendingTarget::Contract(address), config, || async move {
        let code = chain.code_at(address).await?;
        Ok((!code.is_empty()).then_some(code))
    })
    .await
}
