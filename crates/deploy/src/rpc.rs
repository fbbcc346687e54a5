//! Shared utilities for talking to Ethereum JSON-RPC endpoints.

use std::time::Duration;

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use crate::DeployError;

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, DeployError> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(|e| DeployError::Configuration(format!("failed to create HTTP client: {e}")))
}

/// A failed JSON-RPC call.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("failed to send {method} request: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} returned RPC error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },
    #[error("failed to decode {method} response: {reason}")]
    Decode { method: String, reason: String },
}

impl RpcError {
    /// Whether the node rejected the call because execution reverted.
    pub fn is_revert(&self) -> bool {
        match self {
            RpcError::Rpc { message, code, .. } => {
                *code == 3 || message.to_ascii_lowercase().contains("revert")
            }
            _ => false,
        }
    }
}

impl From<RpcError> for DeployError {
    fn from(err: RpcError) -> Self {
        DeployError::Network(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Make a JSON-RPC call and deserialize the result.
///
/// A `null` result deserializes into `Option::None` when `T` is an `Option`.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, RpcError> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .map_err(|source| RpcError::Transport {
            method: method.to_string(),
            source,
        })?;

    let mut body: Value = response.json().await.map_err(|source| RpcError::Transport {
        method: method.to_string(),
        source,
    })?;

    if let Some(error) = body.get("error") {
        let error: RpcErrorObject =
            serde_json::from_value(error.clone()).unwrap_or(RpcErrorObject {
                code: 0,
                message: error.to_string(),
            });
        return Err(RpcError::Rpc {
            method: method.to_string(),
            code: error.code,
            message: error.message,
        });
    }

    let result = body
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| RpcError::Decode {
            method: method.to_string(),
            reason: "no result in response".to_string(),
        })?;

    serde_json::from_value(result).map_err(|e| RpcError::Decode {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a hex quantity (`0x1a`) into a u64.
pub fn parse_quantity(s: &str) -> Result<u64, std::num::ParseIntError> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
}
