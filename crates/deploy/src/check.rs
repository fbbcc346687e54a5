//! Connectivity check for configured networks.

use std::sync::Arc;

use crate::{
    ApprovalProcess, ApprovalProcessResolver, ChainClient, DeployError, JsonRpcChainClient,
    NetworkProfile, NetworkRegistry, ProxyService,
};

/// Check result for a single network.
#[derive(Debug)]
pub struct NetworkCheck {
    pub network: String,
    pub expected_chain_id: u64,
    /// Chain id reported by the endpoint, if it matches the configured one.
    pub chain_id: Result<u64, DeployError>,
    /// Approval process governing upgrades on the network.
    pub approval_process: Result<ApprovalProcess, DeployError>,
}

impl NetworkCheck {
    pub fn healthy(&self) -> bool {
        self.chain_id.is_ok() && self.approval_process.is_ok()
    }

    /// The first failure, as it would surface in a deployment run.
    pub fn error(&self) -> Option<&DeployError> {
        self.chain_id
            .as_ref()
            .err()
            .or_else(|| self.approval_process.as_ref().err())
    }

    /// Consume the check, keeping only its first failure.
    pub fn into_error(self) -> Option<DeployError> {
        match (self.chain_id, self.approval_process) {
            (Err(err), _) | (Ok(_), Err(err)) => Some(err),
            (Ok(_), Ok(_)) => None,
        }
    }
}

/// Check one network against a given chain client.
pub async fn check_network<C: ChainClient, P: ProxyService>(
    profile: &NetworkProfile,
    chain: &C,
    resolver: &ApprovalProcessResolver<P>,
) -> NetworkCheck {
    let (chain_id, approval_process) =
        futures::join!(chain.chain_id(), resolver.resolve(&profile.name, None));
    let chain_id = chain_id.and_then(|id| profile.ensure_chain_id(id).map(|()| id));

    NetworkCheck {
        network: profile.name.clone(),
        expected_chain_id: profile.chain_id,
        chain_id,
        approval_process,
    }
}

/// Check every network of `registry` concurrently over JSON-RPC.
pub async fn check_all<P: ProxyService>(
    registry: &NetworkRegistry,
    service: Arc<P>,
) -> Vec<NetworkCheck> {
    let resolver = ApprovalProcessResolver::new(service);
    let resolver = &resolver;

    let checks = registry.iter().map(|profile| async move {
        match JsonRpcChainClient::new(profile.rpc_url.clone()) {
            Ok(chain) => check_network(profile, &chain, resolver).await,
            Err(err) => NetworkCheck {
                network: profile.name.clone(),
                expected_chain_id: profile.chain_id,
                chain_id: Err(err),
                approval_process: resolver.resolve(&profile.name, None).await,
            },
        }
    });

    let results = futures::future::join_all(checks).await;
    for check in &results {
        tracing::debug!(
            network = %check.network,
            healthy = check.healthy(),
            "Network checked"
        );
    }
    results
}
