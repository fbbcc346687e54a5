//! HTTP client for the approval service.

mod wire;

use std::time::Duration;

use alloy_core::primitives::Address;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;

use crate::{
    DeployError,
    services::{
        ApprovalProcessRecord, ProposalReceipt, ProxyDeployRequest, ProxyDeployment,
        ProxyService, SubmissionError, UpgradeRequest,
    },
};

use wire::{
    ApprovalProcessResponse, DeploymentBody, DeploymentResponse, DeploymentStatus, UpgradeBody,
    UpgradeResponse,
};

/// Default approval service endpoint.
pub const DEFAULT_APPROVAL_SERVICE_URL: &str = "https://defender-api.openzeppelin.com/v2";

/// Default timeout for approval service requests, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the approval service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalServiceConfig {
    pub base_url: String,
    /// Sent as `X-Api-Key`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Sent as a bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ApprovalServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_APPROVAL_SERVICE_URL.to_string(),
            api_key: None,
            api_secret: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// [`ProxyService`] backed by the approval service's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpApprovalService {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    api_secret: Option<String>,
}

impl HttpApprovalService {
    pub fn new(config: &ApprovalServiceConfig) -> Result<Self, DeployError> {
        Url::parse(&config.base_url).map_err(|e| {
            DeployError::Configuration(format!(
                "invalid approval service url '{}': {}",
                config.base_url, e
            ))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| {
                DeployError::Configuration(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorized(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(api_key) = &self.api_key {
            request = request.header("X-Api-Key", api_key);
        }
        if let Some(api_secret) = &self.api_secret {
            request = request.bearer_auth(api_secret);
        }
        request
    }

    /// Send a request whose failure leaves nothing behind on the service.
    async fn send_idempotent<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, DeployError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, what, &body));
        }

        response.json::<T>().await.map_err(|e| {
            DeployError::Network(format!("invalid {what} response from approval service: {e}"))
        })
    }
}

/// Map a non-success HTTP status to the error taxonomy.
fn classify_status(status: StatusCode, what: &str, body: &str) -> DeployError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DeployError::Configuration(format!(
            "approval service rejected credentials for {what} ({status}): {body}"
        )),
        s if s.is_client_error() => {
            DeployError::Validation(format!("approval service rejected {what} ({status}): {body}"))
        }
        _ => DeployError::Network(format!("approval service failed {what} ({status}): {body}")),
    }
}

impl ProxyService for HttpApprovalService {
    async fn deploy_proxy(
        &self,
        request: &ProxyDeployRequest,
    ) -> Result<ProxyDeployment, DeployError> {
        let body = DeploymentBody::from(request);
        let response: DeploymentResponse = self
            .send_idempotent(
                self.client.post(self.url("deployments")).json(&body),
                "proxy deployment",
            )
            .await?;

        tracing::debug!(
            deployment_id = %response.deployment_id,
            address = %response.address,
            status = ?response.status,
            "Proxy deployment accepted"
        );

        if response.status == DeploymentStatus::Failed {
            return Err(DeployError::DeploymentReverted {
                contract: request.contract_name.clone(),
                reason: response
                    .error
                    .unwrap_or_else(|| format!("deployment {} failed", response.deployment_id)),
            });
        }

        Ok(ProxyDeployment {
            deployment_id: response.deployment_id,
            address: response.address,
            tx_hash: response.tx_hash,
        })
    }

    async fn propose_upgrade(
        &self,
        request: &UpgradeRequest,
    ) -> Result<ProposalReceipt, SubmissionError> {
        let body = UpgradeBody::from(request);
        let response = self
            .authorized(self.client.post(self.url("upgrades")).json(&body))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_builder() {
                    SubmissionError::NotDelivered(e.into())
                } else {
                    SubmissionError::Unknown(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.is_client_error() {
                return Err(SubmissionError::NotDelivered(classify_status(
                    status,
                    "upgrade proposal",
                    &body,
                )));
            }
            return Err(SubmissionError::Unknown(format!(
                "approval service answered {status}: {body}"
            )));
        }

        let response: UpgradeResponse = response
            .json()
            .await
            .map_err(|e| SubmissionError::Unknown(format!("unreadable response: {e}")))?;

        let raw_url = response.external_url.ok_or_else(|| {
            SubmissionError::Unknown(format!(
                "proposal {} was returned without a locator",
                response.proposal_id
            ))
        })?;
        let url = Url::parse(&raw_url).map_err(|e| {
            SubmissionError::Unknown(format!(
                "proposal {} has an invalid locator '{}': {}",
                response.proposal_id, raw_url, e
            ))
        })?;

        Ok(ProposalReceipt {
            proposal_id: response.proposal_id,
            url,
        })
    }

    async fn approval_process(
        &self,
        network: &str,
        proxy: Option<Address>,
    ) -> Result<ApprovalProcessRecord, DeployError> {
        let mut request = self
            .client
            .get(self.url(&format!("approval-process/upgrade/{network}")));
        if let Some(proxy) = proxy {
            request = request.query(&[("proxy", proxy.to_string())]);
        }

        let response: ApprovalProcessResponse =
            self.send_idempotent(request, "approval process query").await?;

        tracing::debug!(
            network,
            approval_process_id = %response.approval_process_id,
            via_type = ?response.via_type,
            "Approval process fetched"
        );

        ApprovalProcessRecord::try_from(response)
    }
}
