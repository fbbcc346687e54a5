//! Builder module for creating an [`Orchestrator`].
//!
//! This module provides the [`OrchestratorBuilder`] struct which selects the
//! target network from the configuration, wires the collaborators and verifies
//! that the endpoint serves the configured chain before anything is deployed.

use std::sync::Arc;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};

use crate::{
    ArtifactSource, ChainClient, DeployError, FinalityConfig, HardhatArtifacts,
    HttpApprovalService, JsonRpcChainClient, NetworkProfile, Orchestrator, OrchestratorConfig,
    ProxyService, RetryConfig,
};

/// Orchestrator over JSON-RPC, the HTTP approval service and Hardhat artifacts.
pub type DefaultOrchestrator =
    Orchestrator<JsonRpcChainClient, HttpApprovalService, HardhatArtifacts>;

/// Builder for creating an [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    network: Option<String>,
}

impl OrchestratorBuilder {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            network: None,
        }
    }

    /// Select the target network by name.
    pub fn network(mut self, name: impl Into<String>) -> Self {
        self.network = Some(name.into());
        self
    }

    /// Override the account sending library deployments.
    pub fn deployer(mut self, deployer: Address) -> Self {
        self.config.deployer = Some(deployer);
        self
    }

    pub fn finality(mut self, finality: FinalityConfig) -> Self {
        self.config.finality = finality;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn profile(&self) -> Result<NetworkProfile, DeployError> {
        let name = self.network.as_deref().ok_or_else(|| {
            DeployError::Validation("a target network is required".to_string())
        })?;
        self.config.networks.lookup(name).cloned()
    }

    /// Build an orchestrator from explicit collaborators and verify its chain id.
    pub async fn build_with<C, P, A>(
        self,
        chain: C,
        service: Arc<P>,
        artifacts: A,
    ) -> Result<Orchestrator<C, P, A>>
    where
        C: ChainClient,
        P: ProxyService,
        A: ArtifactSource,
    {
        let profile = self.profile()?;
        let name = profile.name.clone();

        let orchestrator = Orchestrator::new(
            profile,
            chain,
            service,
            artifacts,
            self.config.deployer,
            self.config.finality,
            self.config.retry,
        );

        orchestrator
            .verify_chain()
            .await
            .with_context(|| format!("Failed to connect to network '{name}'"))?;

        tracing::info!(
            network = %name,
            chain_id = orchestrator.network().chain_id,
            "Connected"
        );

        Ok(orchestrator)
    }

    /// Build an orchestrator with the default collaborators.
    pub async fn build(self) -> Result<DefaultOrchestrator> {
        let profile = self.profile()?;
        let endpoint = profile.endpoint()?;

        let chain = JsonRpcChainClient::new(endpoint.as_str())?;
        let service = Arc::new(HttpApprovalService::new(&self.config.approval_service)?);
        let artifacts = HardhatArtifacts::new(self.config.artifacts_dir.clone());

        self.build_with(chain, service, artifacts).await
    }
}
