//! Approval process resolution.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use alloy_core::primitives::Address;

use crate::{ApprovalProcessRecord, DeployError, ProxyService};

/// An approval process that can approve and execute upgrades on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalProcess {
    pub id: String,
    pub address: Address,
}

impl TryFrom<ApprovalProcessRecord> for ApprovalProcess {
    type Error = DeployError;

    fn try_from(record: ApprovalProcessRecord) -> Result<Self, Self::Error> {
        match record.address {
            Some(address) => Ok(Self {
                id: record.id,
                address,
            }),
            None => Err(DeployError::UnboundApprovalProcess {
                process_id: record.id,
            }),
        }
    }
}

type CacheKey = (String, Option<Address>);

/// Resolves and validates approval processes, caching them for one run.
///
/// Only bound processes are cached, so an unbound answer is re-queried on the
/// next call.
#[derive(Debug)]
pub struct ApprovalProcessResolver<P> {
    service: Arc<P>,
    cache: Mutex<HashMap<CacheKey, ApprovalProcess>>,
}

impl<P: ProxyService> ApprovalProcessResolver<P> {
    pub fn new(service: Arc<P>) -> Self {
        Self {
            service,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, key: &CacheKey) -> Option<ApprovalProcess> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    /// Resolve the approval process governing upgrades on `network`, optionally
    /// scoped to `proxy`. Fails with [`DeployError::UnboundApprovalProcess`] when
    /// the process has no on-chain address.
    pub async fn resolve(
        &self,
        network: &str,
        proxy: Option<Address>,
    ) -> Result<ApprovalProcess, DeployError> {
        let key = (network.to_string(), proxy);
        if let Some(process) = self.cached(&key) {
            tracing::trace!(network, approval_process_id = %process.id, "Approval process cache hit");
            return Ok(process);
        }

        tracing::debug!(network, proxy = ?proxy, "Querying approval process...");
        let record = self.service.approval_process(network, proxy).await?;
        let process = ApprovalProcess::try_from(record)?;

        tracing::info!(
            network,
            approval_process_id = %process.id,
            approval_address = %process.address,
            "Approval process resolved"
        );

        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key, process.clone());

        Ok(process)
    }
}
