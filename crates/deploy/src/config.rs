//! Orchestrator configuration.
//!
//! Values are layered: built-in defaults, then the TOML file, then `UPKIT_`
//! environment variables (`__` separates nested keys, for example
//! `UPKIT_APPROVAL_SERVICE__API_SECRET`).

use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{ApprovalServiceConfig, FinalityConfig, NetworkRegistry, RetryConfig};

/// The default name for the upkit configuration file.
pub const CONFIG_FILENAME: &str = "Upkit.toml";

/// Prefix of environment variables overriding the configuration.
pub const ENV_PREFIX: &str = "UPKIT_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Node-managed account sending library deployments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployer: Option<Address>,
    /// Hardhat artifacts directory.
    pub artifacts_dir: PathBuf,
    /// Address book of past deployments.
    pub deployments_path: PathBuf,
    pub approval_service: ApprovalServiceConfig,
    pub finality: FinalityConfig,
    pub retry: RetryConfig,
    pub networks: NetworkRegistry,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            deployer: None,
            artifacts_dir: PathBuf::from("artifacts"),
            deployments_path: PathBuf::from("deployments.jsonl"),
            approval_service: ApprovalServiceConfig::default(),
            finality: FinalityConfig::default(),
            retry: RetryConfig::default(),
            networks: NetworkRegistry::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Layered configuration sources for `path`.
    ///
    /// A missing file is skipped, so defaults and environment alone are enough.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extract and validate a configuration.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .context("Failed to load upkit configuration")?;
        config.networks.validate()?;
        Ok(config)
    }

    /// Load the configuration from `path`, or from [`CONFIG_FILENAME`] in the
    /// working directory when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) if !path.exists() => {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            Some(path) if path.is_dir() => path.join(CONFIG_FILENAME),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(CONFIG_FILENAME),
        };

        let config = Self::from_figment(Self::figment(&config_path))?;
        tracing::debug!(
            path = %config_path.display(),
            networks = config.networks.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }
}
