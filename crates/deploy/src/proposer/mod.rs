//! Upgrade proposer.
//!
//! Proposing an upgrade is a linear sequence of stages, encoded in the type
//! system so a proposal cannot be submitted before its approval process is
//! resolved or its candidate is linked:
//!
//! ```text
//! Resolve -> Bind -> Submit -> Return
//! ```
//!
//! Failures before `Submit` leave nothing behind and can be retried from the
//! start. A submission whose outcome is unknown fails with
//! [`DeployError::AmbiguousSubmission`]. Nothing is polled after submission;
//! approval and execution happen outside this crate.

mod stages;

use alloy_core::primitives::{Address, B256};
use url::Url;

pub use stages::{Bind, NextStage, ProposalStage, Resolve, Return, Submit};

use crate::{
    ApprovalProcessResolver, DeployError, DeployableUnit, ProxyService, SubmissionError,
    UpgradeRequest,
};

/// A submitted upgrade proposal, tracked out of band through its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeProposal {
    pub network: String,
    pub proxy: Address,
    /// Candidate implementation contract.
    pub contract_name: String,
    pub approval_process_id: String,
    pub approval_address: Address,
    pub proposal_id: String,
    pub url: Url,
    /// Keccak-256 of the candidate's linked creation bytecode.
    pub implementation_hash: B256,
}

impl UpgradeProposal {
    /// Human-followable locator of the proposal.
    pub fn locator(&self) -> &str {
        self.url.as_str()
    }
}

/// An upgrade proposal in stage `S`.
#[derive(Debug)]
pub struct UpgradeProposer<'a, P, S: ProposalStage = Resolve> {
    resolver: &'a ApprovalProcessResolver<P>,
    service: &'a P,
    network: &'a str,
    proxy: Address,
    candidate: &'a DeployableUnit,
    stage: S,
}

impl<'a, P, S: NextStage> UpgradeProposer<'a, P, S> {
    fn advance(self, next: S::Next) -> UpgradeProposer<'a, P, S::Next> {
        UpgradeProposer {
            resolver: self.resolver,
            service: self.service,
            network: self.network,
            proxy: self.proxy,
            candidate: self.candidate,
            stage: next,
        }
    }
}

impl<'a, P: ProxyService> UpgradeProposer<'a, P, Resolve> {
    pub fn new(
        resolver: &'a ApprovalProcessResolver<P>,
        service: &'a P,
        network: &'a str,
        proxy: Address,
        candidate: &'a DeployableUnit,
    ) -> Self {
        Self {
            resolver,
            service,
            network,
            proxy,
            candidate,
            stage: Resolve,
        }
    }

    /// Resolve the approval process governing the proxy. Fails fast if unbound.
    pub async fn resolve(self) -> Result<UpgradeProposer<'a, P, Bind>, DeployError> {
        let approval = self.resolver.resolve(self.network, Some(self.proxy)).await?;
        Ok(self.advance(Bind { approval }))
    }
}

impl<'a, P: ProxyService> UpgradeProposer<'a, P, Bind> {
    /// Check that the candidate is fully linked.
    pub fn bind(self) -> Result<UpgradeProposer<'a, P, Submit>, DeployError> {
        self.candidate.ensure_linked()?;
        let approval = self.stage.approval.clone();
        Ok(self.advance(Submit { approval }))
    }
}

impl<'a, P: ProxyService> UpgradeProposer<'a, P, Submit> {
    /// Send the proposal to the approval service.
    pub async fn submit(self) -> Result<UpgradeProposer<'a, P, Return>, DeployError> {
        let request = UpgradeRequest {
            network: self.network.to_string(),
            proxy: self.proxy,
            approval_process: self.stage.approval.clone(),
            contract_name: self.candidate.contract_name().to_string(),
            bytecode: self.candidate.bytecode().clone(),
            libraries: self.candidate.libraries().clone(),
        };

        tracing::info!(
            network = self.network,
            proxy = %self.proxy,
            contract = self.candidate.contract_name(),
            approval_process_id = %request.approval_process.id,
            "Submitting upgrade proposal..."
        );

        let receipt = self
            .service
            .propose_upgrade(&request)
            .await
            .map_err(|err| match err {
                SubmissionError::NotDelivered(err) => err,
                SubmissionError::Unknown(reason) => DeployError::AmbiguousSubmission {
                    proxy: self.proxy,
                    reason,
                },
            })?;

        let approval = request.approval_process;
        Ok(self.advance(Return { approval, receipt }))
    }
}

impl<P: ProxyService> UpgradeProposer<'_, P, Return> {
    pub fn finish(self) -> UpgradeProposal {
        let Return { approval, receipt } = self.stage;

        tracing::info!(
            network = self.network,
            proxy = %self.proxy,
            proposal_id = %receipt.proposal_id,
            url = %receipt.url,
            "Upgrade proposed"
        );

        UpgradeProposal {
            network: self.network.to_string(),
            proxy: self.proxy,
            contract_name: self.candidate.contract_name().to_string(),
            approval_process_id: approval.id,
            approval_address: approval.address,
            proposal_id: receipt.proposal_id,
            url: receipt.url,
            implementation_hash: self.candidate.bytecode_hash(),
        }
    }
}

/// Run every proposal stage in order.
pub async fn propose_upgrade<P: ProxyService>(
    resolver: &ApprovalProcessResolver<P>,
    service: &P,
    network: &str,
    proxy: Address,
    candidate: &DeployableUnit,
) -> Result<UpgradeProposal, DeployError> {
    Ok(UpgradeProposer::new(resolver, service, network, proxy, candidate)
        .resolve()
        .await?
        .bind()?
        .submit()
        .await?
        .finish())
}
