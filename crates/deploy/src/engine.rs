//! Deployment engine: creates proxy instances and waits for their finality.

use alloy_core::primitives::Address;

use crate::{
    ChainClient, DeployError, DeployableUnit, FinalityConfig, NetworkProfile, ProxyDeployRequest,
    ProxyDeployment, ProxyService, finality,
};

/// A live proxy whose address has code on its network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyInstance {
    pub network: String,
    pub address: Address,
    /// Contract behind the proxy at deployment time.
    pub contract_name: String,
    pub deployment_id: String,
}

/// Deploys proxies on one network.
#[derive(Debug)]
pub struct DeploymentEngine<'a, C, P> {
    network: &'a NetworkProfile,
    chain: &'a C,
    service: &'a P,
    finality: &'a FinalityConfig,
}

impl<'a, C: ChainClient, P: ProxyService> DeploymentEngine<'a, C, P> {
    pub fn new(
        network: &'a NetworkProfile,
        chain: &'a C,
        service: &'a P,
        finality: &'a FinalityConfig,
    ) -> Self {
        Self {
            network,
            chain,
            service,
            finality,
        }
    }

    /// Deploy `unit` behind a new proxy, run `initializer` with the unit's
    /// arguments and wait until the proxy address has code.
    pub async fn deploy_proxy(
        &self,
        unit: &DeployableUnit,
        initializer: &str,
    ) -> Result<ProxyInstance, DeployError> {
        let deployment = self.submit(unit, initializer).await?;
        self.await_finality(unit, deployment).await
    }

    /// Hand the deployment to the proxy service without waiting for finality.
    pub async fn submit(
        &self,
        unit: &DeployableUnit,
        initializer: &str,
    ) -> Result<ProxyDeployment, DeployError> {
        unit.ensure_linked()?;
        if initializer.trim().is_empty() {
            return Err(DeployError::Validation(
                "an initializer function name is required".to_string(),
            ));
        }

        tracing::info!(
            network = %self.network.name,
            contract = unit.contract_name(),
            initializer,
            args = unit.args().len(),
            "Deploying proxy..."
        );

        let request = ProxyDeployRequest {
            network: self.network.name.clone(),
            contract_name: unit.contract_name().to_string(),
            bytecode: unit.bytecode().clone(),
            libraries: unit.libraries().clone(),
            initializer: initializer.to_string(),
            args: unit.args().to_vec(),
            verification: self.network.verification.clone(),
        };

        self.service.deploy_proxy(&request).await
    }

    /// Wait until a submitted deployment is final.
    pub async fn await_finality(
        &self,
        unit: &DeployableUnit,
        deployment: ProxyDeployment,
    ) -> Result<ProxyInstance, DeployError> {
        if let Some(tx_hash) = deployment.tx_hash {
            let receipt = finality::wait_for_receipt(self.chain, tx_hash, self.finality).await?;
            if !receipt.status {
                return Err(DeployError::DeploymentReverted {
                    contract: unit.contract_name().to_string(),
                    reason: format!("proxy creation transaction {tx_hash} reverted"),
                });
            }
        }

        finality::wait_for_code(self.chain, deployment.address, self.finality).await?;

        tracing::info!(
            network = %self.network.name,
            contract = unit.contract_name(),
            proxy = %deployment.address,
            "Proxy deployed"
        );

        Ok(self.instance(unit, deployment))
    }

    fn instance(&self, unit: &DeployableUnit, deployment: ProxyDeployment) -> ProxyInstance {
        ProxyInstance {
            network: self.network.name.clone(),
            address: deployment.address,
            contract_name: unit.contract_name().to_string(),
            deployment_id: deployment.deployment_id,
        }
    }
}
