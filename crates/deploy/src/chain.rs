//! Chain client: the orchestrator's view of one network's JSON-RPC endpoint.

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes};
use serde::Deserialize;

use crate::{
    DeployError,
    rpc::{self, RpcError},
};

/// The subset of a transaction receipt the orchestrator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    pub contract_address: Option<Address>,
    /// `true` when the transaction succeeded.
    pub status: bool,
}

/// Network client collaborator.
///
/// Every method is a single network round-trip and may be cancelled by dropping
/// the returned future. Cancelling after a transaction was sent does not retract it.
pub trait ChainClient: Send + Sync {
    /// Chain id reported by the endpoint.
    fn chain_id(&self) -> impl Future<Output = Result<u64, DeployError>> + Send;

    /// Runtime code at `address` (empty when nothing is deployed there).
    fn code_at(&self, address: Address) -> impl Future<Output = Result<Bytes, DeployError>> + Send;

    /// Number of transactions sent from `address` (its next nonce).
    fn transaction_count(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<u64, DeployError>> + Send;

    /// Send a contract creation transaction from `from`, an account managed by the endpoint.
    fn send_deployment(
        &self,
        from: Address,
        bytecode: Bytes,
    ) -> impl Future<Output = Result<B256, DeployError>> + Send;

    /// Receipt of `tx_hash`, or `None` while it is still pending.
    fn receipt(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = Result<Option<TransactionReceipt>, DeployError>> + Send;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    #[serde(default)]
    contract_address: Option<Address>,
    #[serde(default)]
    status: Option<String>,
}

impl TryFrom<RpcReceipt> for TransactionReceipt {
    type Error = DeployError;

    fn try_from(receipt: RpcReceipt) -> Result<Self, Self::Error> {
        let status = match receipt.status.as_deref() {
            Some(status) => rpc::parse_quantity(status)
                .map_err(|e| DeployError::Network(format!("invalid receipt status: {e}")))?
                == 1,
            // Pre-Byzantium receipts carry no status.
            None => true,
        };
        Ok(Self {
            transaction_hash: receipt.transaction_hash,
            contract_address: receipt.contract_address,
            status,
        })
    }
}

/// [`ChainClient`] over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct JsonRpcChainClient {
    client: reqwest::Client,
    url: String,
}

impl JsonRpcChainClient {
    pub fn new(url: impl Into<String>) -> Result<Self, DeployError> {
        Ok(Self {
            client: rpc::create_client()?,
            url: url.into(),
        })
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T, RpcError> {
        rpc::json_rpc_call(&self.client, &self.url, method, params).await
    }
}

impl ChainClient for JsonRpcChainClient {
    async fn chain_id(&self) -> Result<u64, DeployError> {
        let chain_id: String = self.call("eth_chainId", vec![]).await?;
        rpc::parse_quantity(&chain_id)
            .map_err(|e| DeployError::Network(format!("invalid eth_chainId response: {e}")))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, DeployError> {
        Ok(self
            .call(
                "eth_getCode",
                vec![serde_json::json!(address), serde_json::json!("latest")],
            )
            .await?)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, DeployError> {
        let count: String = self
            .call(
                "eth_getTransactionCount",
                vec![serde_json::json!(address), serde_json::json!("pending")],
            )
            .await?;
        rpc::parse_quantity(&count).map_err(|e| {
            DeployError::Network(format!("invalid eth_getTransactionCount response: {e}"))
        })
    }

    async fn send_deployment(&self, from: Address, bytecode: Bytes) -> Result<B256, DeployError> {
        self.call(
            "eth_sendTransaction",
            vec![serde_json::json!({
                "from": from,
                "data": bytecode,
            })],
        )
        .await
        .map_err(|err| {
            if err.is_revert() {
                DeployError::DeploymentReverted {
                    contract: "contract creation".to_string(),
                    reason: err.to_string(),
                }
            } else {
                err.into()
            }
        })
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>, DeployError> {
        let receipt: Option<RpcReceipt> = self
            .call("eth_getTransactionReceipt", vec![serde_json::json!(tx_hash)])
            .await?;
        receipt.map(TransactionReceipt::try_from).transpose()
    }
}
