//! JSON bodies exchanged with the approval service.

use alloy_core::primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};

use crate::{
    DeployError, InitArg, LibraryBindings, VerificationConfig, address::parse_address,
    services::{ApprovalProcessRecord, ProxyDeployRequest, UpgradeRequest},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ApprovalProcessResponse {
    pub approval_process_id: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub via_type: Option<String>,
}

impl TryFrom<ApprovalProcessResponse> for ApprovalProcessRecord {
    type Error = DeployError;

    fn try_from(response: ApprovalProcessResponse) -> Result<Self, Self::Error> {
        let address = match response.address.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(parse_address(raw)?),
        };

        Ok(Self {
            id: response.approval_process_id,
            address,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct InitializerCall<'a> {
    pub name: &'a str,
    pub args: &'a [InitArg],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct VerificationPayload<'a> {
    pub api_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_url: Option<&'a str>,
}

impl<'a> From<&'a VerificationConfig> for VerificationPayload<'a> {
    fn from(config: &'a VerificationConfig) -> Self {
        Self {
            api_key: config.api_key.as_deref(),
            api_url: config.api_url.as_deref(),
            browser_url: config.browser_url.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DeploymentBody<'a> {
    pub contract_name: &'a str,
    pub network: &'a str,
    pub bytecode: &'a Bytes,
    pub libraries: &'a LibraryBindings,
    pub kind: &'static str,
    pub initializer: InitializerCall<'a>,
    pub verification: Option<VerificationPayload<'a>>,
}

impl<'a> From<&'a ProxyDeployRequest> for DeploymentBody<'a> {
    fn from(request: &'a ProxyDeployRequest) -> Self {
        Self {
            contract_name: &request.contract_name,
            network: &request.network,
            bytecode: &request.bytecode,
            libraries: &request.libraries,
            kind: "proxy",
            initializer: InitializerCall {
                name: &request.initializer,
                args: &request.args,
            },
            verification: request.verification.as_ref().map(VerificationPayload::from),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(super) enum DeploymentStatus {
    Submitted,
    Completed,
    Failed,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DeploymentResponse {
    pub deployment_id: String,
    pub address: Address,
    #[serde(default)]
    pub tx_hash: Option<B256>,
    pub status: DeploymentStatus,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Implementation<'a> {
    pub contract_name: &'a str,
    pub bytecode: &'a Bytes,
    pub libraries: &'a LibraryBindings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UpgradeBody<'a> {
    pub network: &'a str,
    pub proxy_address: Address,
    pub approval_process_id: &'a str,
    pub approval_address: Address,
    pub new_implementation: Implementation<'a>,
}

impl<'a> From<&'a UpgradeRequest> for UpgradeBody<'a> {
    fn from(request: &'a UpgradeRequest) -> Self {
        Self {
            network: &request.network,
            proxy_address: request.proxy,
            approval_process_id: &request.approval_process.id,
            approval_address: request.approval_process.address,
            new_implementation: Implementation {
                contract_name: &request.contract_name,
                bytecode: &request.bytecode,
                libraries: &request.libraries,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UpgradeResponse {
    pub proposal_id: String,
    #[serde(default)]
    pub external_url: Option<String>,
}
