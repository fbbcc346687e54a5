//! External proxy and upgrade service.
//!
//! The service deploys proxies, accepts upgrade proposals and knows which
//! approval process governs upgrades on a network. Each client implementation
//! lives in its own submodule with:
//! - `mod.rs` - Config, client and request logic
//! - `wire.rs` - JSON request and response bodies

pub mod approval_api;

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes};
use url::Url;

use crate::{ApprovalProcess, DeployError, InitArg, LibraryBindings, VerificationConfig};

pub use approval_api::{ApprovalServiceConfig, HttpApprovalService};

/// Request to create a new proxy in front of a fresh implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDeployRequest {
    pub network: String,
    pub contract_name: String,
    pub bytecode: Bytes,
    pub libraries: LibraryBindings,
    /// Name of the initializer function, run once through the proxy.
    pub initializer: String,
    /// Initializer arguments, in declaration order.
    pub args: Vec<InitArg>,
    pub verification: Option<VerificationConfig>,
}

/// The service's answer to a [`ProxyDeployRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDeployment {
    pub deployment_id: String,
    pub address: Address,
    /// Creation transaction, when the service reports it.
    pub tx_hash: Option<B256>,
}

/// Request to replace the implementation behind an existing proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    pub network: String,
    pub proxy: Address,
    pub approval_process: ApprovalProcess,
    pub contract_name: String,
    pub bytecode: Bytes,
    pub libraries: LibraryBindings,
}

/// Reference returned once a proposal has been accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalReceipt {
    pub proposal_id: String,
    pub url: Url,
}

/// Approval process record as reported by the service, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalProcessRecord {
    pub id: String,
    pub address: Option<Address>,
}

/// Failure of a proposal submission.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// The request never reached the service, or the service rejected it
    /// without creating anything.
    #[error(transparent)]
    NotDelivered(DeployError),
    /// The request may have been accepted but its outcome is unknown.
    #[error("submission outcome unknown: {0}")]
    Unknown(String),
}

/// Proxy/upgrade service collaborator.
pub trait ProxyService: Send + Sync {
    /// Deploy a proxy and its implementation, returning once the service has
    /// accepted the deployment. The address may not have code yet.
    fn deploy_proxy(
        &self,
        request: &ProxyDeployRequest,
    ) -> impl Future<Output = Result<ProxyDeployment, DeployError>> + Send;

    /// Submit an upgrade proposal.
    fn propose_upgrade(
        &self,
        request: &UpgradeRequest,
    ) -> impl Future<Output = Result<ProposalReceipt, SubmissionError>> + Send;

    /// Query the approval process governing upgrades on `network`, optionally
    /// scoped to one proxy.
    fn approval_process(
        &self,
        network: &str,
        proxy: Option<Address>,
    ) -> impl Future<Output = Result<ApprovalProcessRecord, DeployError>> + Send;
}
