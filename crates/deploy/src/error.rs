//! Error taxonomy for deployment and upgrade runs.
//!
//! Every operation of the orchestrator core returns a [`DeployError`]. Each variant
//! belongs to exactly one [`ErrorCategory`], which decides whether an outer control
//! loop may retry it and which exit status the CLI reports.

use alloy_core::primitives::{Address, B256};

/// Coarse failure classes surfaced to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorCategory {
    ConfigurationError,
    ValidationError,
    NetworkError,
    DeploymentReverted,
    FinalityTimeout,
    UnboundApprovalProcess,
    AmbiguousSubmission,
}

impl ErrorCategory {
    /// Process exit status reported for a run that failed with this category.
    pub fn exit_code(&self) -> u8 {
        match self {
            ErrorCategory::ConfigurationError => 2,
            ErrorCategory::ValidationError => 3,
            ErrorCategory::NetworkError => 4,
            ErrorCategory::DeploymentReverted => 5,
            ErrorCategory::FinalityTimeout => 6,
            ErrorCategory::UnboundApprovalProcess => 7,
            ErrorCategory::AmbiguousSubmission => 8,
        }
    }
}

/// What a finality wait was waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingTarget {
    /// A transaction whose receipt never showed up.
    Transaction(B256),
    /// A contract address that never got code.
    Contract(Address),
}

impl std::fmt::Display for PendingTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PendingTarget::Transaction(hash) => write!(f, "transaction {hash}"),
            PendingTarget::Contract(address) => write!(f, "contract {address}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("unknown network '{0}'")]
    UnknownNetwork(String),

    #[error("contract '{0}' not found in the compiled artifacts")]
    ContractNotFound(String),

    #[error("unresolved library bindings for '{contract}': {}", describe_bindings(.missing, .malformed))]
    UnresolvedLibraries {
        contract: String,
        missing: Vec<String>,
        malformed: Vec<String>,
    },

    #[error("chain id mismatch on '{network}': configured {expected}, endpoint reports {actual}")]
    ChainIdMismatch {
        network: String,
        expected: u64,
        actual: u64,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid address '{value}': {reason}")]
    InvalidAddress { value: String, reason: String },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("deployment of '{contract}' reverted: {reason}")]
    DeploymentReverted { contract: String, reason: String },

    #[error("finality not observed for {target} within {timeout_secs}s")]
    FinalityTimeout {
        target: PendingTarget,
        timeout_secs: u64,
    },

    #[error(
        "upgrade approval process with id {process_id} has no assigned address"
    )]
    UnboundApprovalProcess { process_id: String },

    #[error(
        "upgrade proposal for proxy {proxy} may or may not have been accepted ({reason}); verify with the approval service before retrying"
    )]
    AmbiguousSubmission { proxy: Address, reason: String },
}

fn describe_bindings(missing: &[String], malformed: &[String]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing [{}]", missing.join(", ")));
    }
    if !malformed.is_empty() {
        parts.push(format!("malformed [{}]", malformed.join(", ")));
    }
    parts.join("; ")
}

impl DeployError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DeployError::UnknownNetwork(_)
            | DeployError::ContractNotFound(_)
            | DeployError::UnresolvedLibraries { .. }
            | DeployError::ChainIdMismatch { .. }
            | DeployError::Configuration(_) => ErrorCategory::ConfigurationError,
            DeployError::InvalidAddress { .. } | DeployError::Validation(_) => {
                ErrorCategory::ValidationError
            }
            DeployError::Network(_) => ErrorCategory::NetworkError,
            DeployError::DeploymentReverted { .. } => ErrorCategory::DeploymentReverted,
            DeployError::FinalityTimeout { .. } => ErrorCategory::FinalityTimeout,
            DeployError::UnboundApprovalProcess { .. } => ErrorCategory::UnboundApprovalProcess,
            DeployError::AmbiguousSubmission { .. } => ErrorCategory::AmbiguousSubmission,
        }
    }

    /// Whether an outer control loop may retry the failed step.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::NetworkError | ErrorCategory::FinalityTimeout
        )
    }

    /// Find the first [`DeployError`] in an `anyhow` error chain.
    pub fn find_in(err: &anyhow::Error) -> Option<&DeployError> {
        err.chain().find_map(|cause| cause.downcast_ref::<DeployError>())
    }
}

impl From<reqwest::Error> for DeployError {
    fn from(err: reqwest::Error) -> Self {
        DeployError::Network(err.to_string())
    }
}
