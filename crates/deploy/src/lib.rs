//! upkit-deploy - Deployment and upgrade orchestration for upgradeable proxies.
//!
//! This crate resolves a contract's library dependencies, deploys proxy-backed
//! instances and proposes implementation upgrades through an external approval
//! process, across a declarative table of networks.

pub mod address;
mod approval;
mod artifacts;
mod builder;
mod chain;
pub mod check;
mod config;
pub mod deployments;
mod engine;
mod error;
pub mod finality;
pub mod linker;
mod network;
mod orchestrator;
pub mod proposer;
pub mod retry;
pub mod rpc;
pub mod services;
mod unit;

pub use approval::{ApprovalProcess, ApprovalProcessResolver};
pub use artifacts::{ArtifactSource, ContractArtifact, HardhatArtifacts, LinkOffset};
pub use builder::{DefaultOrchestrator, OrchestratorBuilder};
pub use chain::{ChainClient, JsonRpcChainClient, TransactionReceipt};
pub use check::{NetworkCheck, check_all, check_network};
pub use config::{CONFIG_FILENAME, ENV_PREFIX, OrchestratorConfig};
pub use deployments::{AddressBook, DeploymentRecord, RecordEntry};
pub use engine::{DeploymentEngine, ProxyInstance};
pub use error::{DeployError, ErrorCategory, PendingTarget};
pub use finality::FinalityConfig;
pub use linker::LibraryDeployment;
pub use network::{NetworkProfile, NetworkRegistry, VerificationConfig};
pub use orchestrator::Orchestrator;
pub use proposer::{UpgradeProposal, UpgradeProposer};
pub use retry::RetryConfig;
pub use services::{
    ApprovalProcessRecord, ApprovalServiceConfig, HttpApprovalService, ProposalReceipt,
    ProxyDeployRequest, ProxyDeployment, ProxyService, SubmissionError, UpgradeRequest,
};
pub use unit::{APPROVAL_PROCESS_ARG, ArgSpec, DeployableUnit, InitArg, LibraryBindings};
