//! Network registry: the declarative table of networks a run can target.

use std::collections::HashSet;

use derive_more::Deref;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::DeployError;

/// Block explorer verification settings for a network.
///
/// These are only passed through to the approval service alongside deployments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Block explorer API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Explorer API endpoint, for explorers that are not built into the verifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Explorer browser URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_url: Option<String>,
}

/// Connection parameters for a single network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// Network identifier, as passed on the command line.
    pub name: String,
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    /// Chain id the endpoint must report.
    pub chain_id: u64,
    /// Optional block explorer verification settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationConfig>,
}

impl NetworkProfile {
    pub fn new(name: impl Into<String>, rpc_url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            name: name.into(),
            rpc_url: rpc_url.into(),
            chain_id,
            verification: None,
        }
    }

    pub fn with_verification(mut self, verification: VerificationConfig) -> Self {
        self.verification = Some(verification);
        self
    }

    /// Parsed JSON-RPC endpoint.
    pub fn endpoint(&self) -> Result<Url, DeployError> {
        Url::parse(&self.rpc_url).map_err(|e| {
            DeployError::Configuration(format!(
                "network '{}' has an invalid rpc_url '{}': {}",
                self.name, self.rpc_url, e
            ))
        })
    }

    /// Fail if the endpoint reports a different chain than configured.
    pub fn ensure_chain_id(&self, actual: u64) -> Result<(), DeployError> {
        if actual != self.chain_id {
            return Err(DeployError::ChainIdMismatch {
                network: self.name.clone(),
                expected: self.chain_id,
                actual,
            });
        }
        Ok(())
    }
}

/// Read-only table of [`NetworkProfile`]s keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Deref, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkRegistry(Vec<NetworkProfile>);

impl NetworkRegistry {
    pub fn new(networks: Vec<NetworkProfile>) -> Result<Self, DeployError> {
        let registry = Self(networks);
        registry.validate()?;
        Ok(registry)
    }

    /// Look up a network by name.
    pub fn lookup(&self, name: &str) -> Result<&NetworkProfile, DeployError> {
        self.0
            .iter()
            .find(|profile| profile.name == name)
            .ok_or_else(|| DeployError::UnknownNetwork(name.to_string()))
    }

    /// Reject duplicate names and unparsable endpoints.
    pub fn validate(&self) -> Result<(), DeployError> {
        let mut seen = HashSet::new();
        for profile in &self.0 {
            if !seen.insert(profile.name.as_str()) {
                return Err(DeployError::Configuration(format!(
                    "network '{}' is defined more than once",
                    profile.name
                )));
            }
            profile.endpoint()?;
        }
        Ok(())
    }
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self(vec![
            NetworkProfile::new(
                "sepolia",
                "https://ethereum-sepolia-rpc.publicnode.com",
                11155111,
            ),
            NetworkProfile::new("celo", "https://forno.celo.org", 42220).with_verification(
                VerificationConfig {
                    api_key: None,
                    api_url: Some("https://api.celoscan.io/api".to_string()),
                    browser_url: Some("https://celoscan.io/".to_string()),
                },
            ),
            NetworkProfile::new("optimism", "https://mainnet.optimism.io", 10),
            NetworkProfile::new("polygon", "https://polygon-rpc.com", 137),
            NetworkProfile::new(
                "alfajores",
                "https://alfajores-forno.celo-testnet.org",
                44787,
            )
            .with_verification(VerificationConfig {
                api_key: None,
                api_url: Some("https://api-alfajores.celoscan.io/api".to_string()),
                browser_url: Some("https://alfajores.celoscan.io".to_string()),
            }),
        ])
    }
}
