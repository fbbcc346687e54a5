//! One orchestration run against a single network.
//!
//! The [`Orchestrator`] receives its collaborators explicitly: a chain client for
//! the network, the proxy/upgrade service and the compiled-artifact set. Library
//! addresses are passed in by the caller on every call and returned, never stored.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError},
};

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};

use crate::{
    ApprovalProcess, ApprovalProcessResolver, ArgSpec, ArtifactSource, ChainClient, DeployError,
    DeployableUnit, DeploymentEngine, FinalityConfig, InitArg, LibraryDeployment,
    NetworkProfile, ProxyDeployment, ProxyInstance, ProxyService, RetryConfig, UpgradeProposal,
    linker, proposer, retry::with_retry,
};

/// Deployment and upgrade orchestrator bound to one network.
pub struct Orchestrator<C, P, A> {
    network: NetworkProfile,
    chain: C,
    service: Arc<P>,
    artifacts: A,
    resolver: ApprovalProcessResolver<P>,
    deployer: Option<Address>,
    finality: FinalityConfig,
    retry: RetryConfig,
}

impl<C, P, A> Orchestrator<C, P, A>
where
    C: ChainClient,
    P: ProxyService,
    A: ArtifactSource,
{
    pub(crate) fn new(
        network: NetworkProfile,
        chain: C,
        service: Arc<P>,
        artifacts: A,
        deployer: Option<Address>,
        finality: FinalityConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            network,
            chain,
            resolver: ApprovalProcessResolver::new(service.clone()),
            service,
            artifacts,
            deployer,
            finality,
            retry,
        }
    }

    pub fn network(&self) -> &NetworkProfile {
        &self.network
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    /// Check that the endpoint serves the configured chain.
    pub async fn verify_chain(&self) -> Result<u64, DeployError> {
        let actual = with_retry(&self.retry, "chain id query", || self.chain.chain_id()).await?;
        self.network.ensure_chain_id(actual)?;
        tracing::debug!(network = %self.network.name, chain_id = actual, "Chain id verified");
        Ok(actual)
    }

    /// Resolve the approval process of this network, optionally scoped to a proxy.
    pub async fn approval_process(&self, proxy: Option<Address>) -> Result<ApprovalProcess> {
        with_retry(&self.retry, "approval process query", || {
            self.resolver.resolve(&self.network.name, proxy)
        })
        .await
        .with_context(|| match proxy {
            Some(proxy) => format!(
                "Failed to resolve the approval process for proxy {} on '{}'",
                proxy, self.network.name
            ),
            None => format!(
                "Failed to resolve the approval process on '{}'",
                self.network.name
            ),
        })
    }

    /// Replace placeholders in operator-supplied arguments.
    pub async fn resolve_args(&self, specs: &[ArgSpec]) -> Result<Vec<InitArg>, DeployError> {
        let mut args = Vec::with_capacity(specs.len());
        for spec in specs {
            let arg = match spec {
                ArgSpec::Value(arg) => arg.clone(),
                ArgSpec::ApprovalProcess => {
                    let process = self.resolver.resolve(&self.network.name, None).await?;
                    InitArg::Address(process.address)
                }
            };
            args.push(arg);
        }
        Ok(args)
    }

    /// Load and link `contract_name` into a fresh [`DeployableUnit`].
    pub fn build_unit(
        &self,
        contract_name: &str,
        libraries: &BTreeMap<String, String>,
        args: Vec<InitArg>,
    ) -> Result<DeployableUnit, DeployError> {
        linker::build_unit(&self.artifacts, contract_name, libraries, args)
    }

    /// Deploy a library from the configured deployer account.
    ///
    /// The returned address must be recorded by the caller for later linking.
    /// A sent transaction is never resent; retries wait on its receipt.
    pub async fn deploy_library(&self, contract_name: &str) -> Result<LibraryDeployment> {
        let context = || {
            format!(
                "Failed to deploy library '{}' on '{}'",
                contract_name, self.network.name
            )
        };

        let from = self
            .deployer
            .ok_or_else(|| {
                DeployError::Configuration(
                    "no deployer account configured (set `deployer`)".to_string(),
                )
            })
            .with_context(context)?;

        let pending: Mutex<Option<B256>> = Mutex::new(None);
        let pending = &pending;

        with_retry(&self.retry, "library deployment", move || async move {
            let previous = *pending.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(tx_hash) = previous {
                tracing::info!(
                    library = contract_name,
                    tx_hash = %tx_hash,
                    "Waiting on previously sent library deployment..."
                );
                return linker::await_library(&self.chain, contract_name, tx_hash, &self.finality)
                    .await;
            }

            let unit = self.build_unit(contract_name, &BTreeMap::new(), Vec::new())?;
            let tx_hash = linker::send_library(&self.chain, from, &unit).await?;
            *pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx_hash);

            linker::await_library(&self.chain, contract_name, tx_hash, &self.finality).await
        })
        .await
        .with_context(context)
    }

    /// Deploy `contract_name` behind a new proxy and run `initializer` once.
    ///
    /// Once the service has accepted a deployment it is never resubmitted: a
    /// retry after a finality timeout keeps waiting on the same proxy address.
    /// Attempts that fail before submission link a fresh unit.
    pub async fn deploy(
        &self,
        contract_name: &str,
        libraries: &BTreeMap<String, String>,
        args: &[ArgSpec],
        initializer: &str,
    ) -> Result<ProxyInstance> {
        let engine =
            DeploymentEngine::new(&self.network, &self.chain, &*self.service, &self.finality);
        let engine = &engine;

        let pending: Mutex<Option<(DeployableUnit, ProxyDeployment)>> = Mutex::new(None);
        let pending = &pending;

        with_retry(&self.retry, "proxy deployment", move || async move {
            let previous = pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some((unit, deployment)) = previous {
                tracing::info!(
                    network = %self.network.name,
                    proxy = %deployment.address,
                    "Waiting on previously submitted proxy..."
                );
                return engine.await_finality(&unit, deployment).await;
            }

            let args = self.resolve_args(args).await?;
            let unit = self.build_unit(contract_name, libraries, args)?;
            let deployment = engine.submit(&unit, initializer).await?;
            *pending.lock().unwrap_or_else(PoisonError::into_inner) =
                Some((unit.clone(), deployment.clone()));

            engine.await_finality(&unit, deployment).await
        })
        .await
        .with_context(|| {
            format!(
                "Failed to deploy proxy for '{}' on '{}' (libraries: {})",
                contract_name,
                self.network.name,
                describe_libraries(libraries)
            )
        })
    }

    /// Propose upgrading `proxy` to a freshly linked `contract_name`.
    ///
    /// The approval process is resolved before the candidate is linked, and an
    /// ambiguous submission is never retried.
    pub async fn propose_upgrade(
        &self,
        proxy: Address,
        contract_name: &str,
        libraries: &BTreeMap<String, String>,
    ) -> Result<UpgradeProposal> {
        with_retry(&self.retry, "upgrade proposal", move || async move {
            self.resolver
                .resolve(&self.network.name, Some(proxy))
                .await?;
            let candidate = self.build_unit(contract_name, libraries, Vec::new())?;
            proposer::propose_upgrade(
                &self.resolver,
                &*self.service,
                &self.network.name,
                proxy,
                &candidate,
            )
            .await
        })
        .await
        .with_context(|| {
            format!(
                "Failed to propose upgrade of proxy {} to '{}' on '{}' (libraries: {})",
                proxy,
                contract_name,
                self.network.name,
                describe_libraries(libraries)
            )
        })
    }
}

fn describe_libraries(libraries: &BTreeMap<String, String>) -> String {
    if libraries.is_empty() {
        return "none".to_string();
    }
    libraries
        .iter()
        .map(|(name, address)| format!("{name}={address}"))
        .collect::<Vec<_>>()
        .join(", ")
}
