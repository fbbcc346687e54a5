//! End-to-end runs of the orchestrator against in-memory collaborators.
//!
//! The chain and the proxy service share one ledger of contract code, so a proxy
//! created by the service becomes visible to the chain client once it is "mined".
//! Run with: cargo test --test integration_test

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use alloy_core::primitives::{Address, B256, Bytes, keccak256};
use anyhow::Result;
use tempdir::TempDir;
use tokio::time::Instant;
use upkit_deploy::{
    AddressBook, ApprovalProcessRecord, ArgSpec, ChainClient, ContractArtifact, DeployError,
    ErrorCategory, FinalityConfig, InitArg, LinkOffset, NetworkProfile, NetworkRegistry,
    Orchestrator, OrchestratorBuilder, OrchestratorConfig, ProposalReceipt, ProxyDeployRequest,
    ProxyDeployment, ProxyService, RecordEntry, RetryConfig, SubmissionError, TransactionReceipt,
    UpgradeRequest,
};
use url::Url;

const NETWORK: &str = "testnetA";
const CHAIN_ID: u64 = 1;
const PLACEHOLDER: &str = "__$0123456789abcdef0123456789abcdef01$__";

const DEPLOYER: Address = Address::repeat_byte(0x70);
const FACTORY: Address = Address::repeat_byte(0x50);
const UTILS: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const OWNER: Address = Address::repeat_byte(0xbb);
const APPROVAL_ADDRESS: Address = Address::repeat_byte(0xcc);
const PROXY: Address = Address::repeat_byte(0xdd);

/// Address of the `nonce`-th contract created by `creator`.
fn created_address(creator: Address, nonce: u64) -> Address {
    let hash = keccak256([creator.as_slice(), &nonce.to_be_bytes()[..]].concat());
    Address::from_slice(&hash[12..])
}

/// Contract code and receipts known to the fake network.
#[derive(Default)]
struct Ledger {
    live_at: Mutex<HashMap<Address, Instant>>,
    receipts: Mutex<HashMap<B256, TransactionReceipt>>,
    nonces: Mutex<HashMap<Address, u64>>,
}

impl Ledger {
    fn schedule(&self, address: Address, delay: Duration) {
        self.live_at
            .lock()
            .unwrap()
            .insert(address, Instant::now() + delay);
    }

    fn has_code(&self, address: Address) -> bool {
        self.live_at
            .lock()
            .unwrap()
            .get(&address)
            .is_some_and(|at| *at <= Instant::now())
    }
}

struct MockChain {
    chain_id: u64,
    ledger: Arc<Ledger>,
}

impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<u64, DeployError> {
        Ok(self.chain_id)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, DeployError> {
        if self.ledger.has_code(address) {
            Ok(Bytes::from_static(&[0x60, 0x80]))
        } else {
            Ok(Bytes::new())
        }
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, DeployError> {
        Ok(*self.ledger.nonces.lock().unwrap().get(&address).unwrap_or(&0))
    }

    async fn send_deployment(&self, from: Address, bytecode: Bytes) -> Result<B256, DeployError> {
        let nonce = {
            let mut nonces = self.ledger.nonces.lock().unwrap();
            let nonce = nonces.entry(from).or_default();
            *nonce += 1;
            *nonce - 1
        };
        let address = created_address(from, nonce);
        let tx_hash = keccak256([&bytecode[..], address.as_slice()].concat());

        self.ledger.schedule(address, Duration::ZERO);
        self.ledger.receipts.lock().unwrap().insert(
            tx_hash,
            TransactionReceipt {
                transaction_hash: tx_hash,
                contract_address: Some(address),
                status: true,
            },
        );
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>, DeployError> {
        Ok(self.ledger.receipts.lock().unwrap().get(&tx_hash).cloned())
    }
}

struct MockService {
    ledger: Arc<Ledger>,
    approval: Mutex<ApprovalProcessRecord>,
    /// Time between a proxy deployment being accepted and its code showing up.
    mining_delay: Duration,
    ambiguous_proposals: bool,
    factory_nonce: AtomicU64,
    approval_queries: AtomicUsize,
    deployments: Mutex<Vec<ProxyDeployRequest>>,
    proposals: Mutex<Vec<UpgradeRequest>>,
}

impl MockService {
    fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            approval: Mutex::new(ApprovalProcessRecord {
                id: "proc-main".to_string(),
                address: Some(APPROVAL_ADDRESS),
            }),
            mining_delay: Duration::ZERO,
            ambiguous_proposals: false,
            factory_nonce: AtomicU64::new(0),
            approval_queries: AtomicUsize::new(0),
            deployments: Mutex::new(Vec::new()),
            proposals: Mutex::new(Vec::new()),
        }
    }

    fn unbound(self, id: &str) -> Self {
        *self.approval.lock().unwrap() = ApprovalProcessRecord {
            id: id.to_string(),
            address: None,
        };
        self
    }

    fn deployment_count(&self) -> usize {
        self.deployments.lock().unwrap().len()
    }

    fn proposal_count(&self) -> usize {
        self.proposals.lock().unwrap().len()
    }
}

impl ProxyService for MockService {
    async fn deploy_proxy(
        &self,
        request: &ProxyDeployRequest,
    ) -> Result<ProxyDeployment, DeployError> {
        let nonce = self.factory_nonce.fetch_add(1, Ordering::SeqCst);
        let address = created_address(FACTORY, nonce);

        self.ledger.schedule(address, self.mining_delay);
        self.deployments.lock().unwrap().push(request.clone());

        Ok(ProxyDeployment {
            deployment_id: format!("dep-{nonce}"),
            address,
            tx_hash: None,
        })
    }

    async fn propose_upgrade(
        &self,
        request: &UpgradeRequest,
    ) -> Result<ProposalReceipt, SubmissionError> {
        let count = {
            let mut proposals = self.proposals.lock().unwrap();
            proposals.push(request.clone());
            proposals.len()
        };

        if self.ambiguous_proposals {
            return Err(SubmissionError::Unknown("connection reset".to_string()));
        }

        let proposal_id = format!("prop-{count}");
        let url = Url::parse(&format!("https://approvals.test/proposals/{proposal_id}")).unwrap();
        Ok(ProposalReceipt { proposal_id, url })
    }

    async fn approval_process(
        &self,
        _network: &str,
        _proxy: Option<Address>,
    ) -> Result<ApprovalProcessRecord, DeployError> {
        self.approval_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.approval.lock().unwrap().clone())
    }
}

type TestOrchestrator = Orchestrator<MockChain, MockService, BTreeMap<String, ContractArtifact>>;

fn artifacts() -> BTreeMap<String, ContractArtifact> {
    let utils = ContractArtifact {
        contract_name: "Utils".to_string(),
        bytecode: "0x60806040".to_string(),
        link_references: BTreeMap::new(),
    };
    let widget = ContractArtifact {
        contract_name: "Widget".to_string(),
        bytecode: format!("0x6080{PLACEHOLDER}6000"),
        link_references: BTreeMap::from([(
            "Utils".to_string(),
            vec![LinkOffset {
                start: 2,
                length: 20,
            }],
        )]),
    };

    BTreeMap::from([
        ("Utils".to_string(), utils),
        ("Widget".to_string(), widget),
    ])
}

fn config() -> OrchestratorConfig {
    OrchestratorConfig {
        networks: NetworkRegistry::new(vec![NetworkProfile::new(
            NETWORK,
            "http://localhost:8545",
            CHAIN_ID,
        )])
        .unwrap(),
        ..OrchestratorConfig::default()
    }
}

fn fast_finality() -> FinalityConfig {
    FinalityConfig {
        timeout_secs: 1,
        poll_interval_ms: 100,
    }
}

/// Test setup: one network, its fake chain and service.
struct TestContext {
    ledger: Arc<Ledger>,
    service: Arc<MockService>,
    retry: RetryConfig,
}

/// Initialize tracing for tests (idempotent).
fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

impl TestContext {
    fn new() -> Self {
        init_test_tracing();
        let ledger = Arc::new(Ledger::default());
        let service = Arc::new(MockService::new(ledger.clone()));
        Self {
            ledger,
            service,
            retry: RetryConfig::disabled(),
        }
    }

    fn with_service(mut self, configure: impl FnOnce(MockService) -> MockService) -> Self {
        self.service = Arc::new(configure(MockService::new(self.ledger.clone())));
        self
    }

    fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn orchestrator_on_chain(&self, chain_id: u64) -> Result<TestOrchestrator> {
        let chain = MockChain {
            chain_id,
            ledger: self.ledger.clone(),
        };

        OrchestratorBuilder::new(config())
            .network(NETWORK)
            .deployer(DEPLOYER)
            .finality(fast_finality())
            .retry(self.retry.clone())
            .build_with(chain, self.service.clone(), artifacts())
            .await
    }

    async fn orchestrator(&self) -> Result<TestOrchestrator> {
        self.orchestrator_on_chain(CHAIN_ID).await
    }
}

fn libraries(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(name, address)| (name.to_string(), address.to_string()))
        .collect()
}

fn category(err: &anyhow::Error) -> ErrorCategory {
    DeployError::find_in(err)
        .unwrap_or_else(|| panic!("no deploy error in chain: {err:#}"))
        .category()
}

#[tokio::test]
async fn test_deploy_links_library_and_initializes_proxy() -> Result<()> {
    let ctx = TestContext::new();
    let orchestrator = ctx.orchestrator().await?;

    let instance = orchestrator
        .deploy(
            "Widget",
            &libraries(&[("Utils", UTILS)]),
            &[ArgSpec::Value(InitArg::Address(OWNER))],
            "initialize",
        )
        .await?;

    assert_eq!(instance.network, NETWORK);
    assert_eq!(instance.contract_name, "Widget");
    assert_ne!(instance.address, Address::repeat_byte(0xaa));
    assert!(!orchestrator.chain().code_at(instance.address).await?.is_empty());

    let deployments = ctx.service.deployments.lock().unwrap();
    assert_eq!(deployments.len(), 1);
    let request = &deployments[0];
    assert_eq!(request.initializer, "initialize");
    assert_eq!(request.args, vec![InitArg::Address(OWNER)]);
    assert_eq!(
        request.libraries.get("Utils"),
        Some(Address::repeat_byte(0xaa))
    );
    assert_eq!(&request.bytecode[2..22], &[0xaa; 20]);

    Ok(())
}

#[tokio::test]
async fn test_deployed_library_is_recorded_and_linked() -> Result<()> {
    let ctx = TestContext::new();
    let orchestrator = ctx.orchestrator().await?;
    let dir = TempDir::new("upkit-book")?;
    let book = AddressBook::new(dir.path().join("deployments.jsonl"));

    let library = orchestrator.deploy_library("Utils").await?;
    assert_eq!(library.address, created_address(DEPLOYER, 0));
    book.append(NETWORK, &library)?;

    let known = book.library_addresses(NETWORK)?;
    let instance = orchestrator
        .deploy("Widget", &known, &[], "initialize")
        .await?;
    book.append(NETWORK, &instance)?;

    assert_ne!(instance.address, library.address);

    let records = book.load()?;
    assert_eq!(records.len(), 2);
    assert!(matches!(
        &records[1].entry,
        RecordEntry::Proxy { contract, address, .. }
            if contract == "Widget" && *address == instance.address
    ));

    let deployments = ctx.service.deployments.lock().unwrap();
    assert_eq!(deployments[0].libraries.get("Utils"), Some(library.address));

    Ok(())
}

#[tokio::test]
async fn test_repeated_deploys_create_distinct_proxies() -> Result<()> {
    let ctx = TestContext::new();
    let orchestrator = ctx.orchestrator().await?;
    let known = libraries(&[("Utils", UTILS)]);

    let first = orchestrator.deploy("Widget", &known, &[], "initialize").await?;
    let second = orchestrator.deploy("Widget", &known, &[], "initialize").await?;

    assert_ne!(first.address, second.address);
    assert_ne!(first.deployment_id, second.deployment_id);
    assert_eq!(ctx.service.deployment_count(), 2);

    Ok(())
}

#[tokio::test]
async fn test_approval_process_placeholder_is_substituted() -> Result<()> {
    let ctx = TestContext::new();
    let orchestrator = ctx.orchestrator().await?;

    let args = ["@approval-process", "1000"]
        .iter()
        .map(|arg| arg.parse::<ArgSpec>())
        .collect::<Result<Vec<_>, _>>()?;

    orchestrator
        .deploy("Widget", &libraries(&[("Utils", UTILS)]), &args, "initialize")
        .await?;

    let deployments = ctx.service.deployments.lock().unwrap();
    assert_eq!(deployments[0].args[0], InitArg::Address(APPROVAL_ADDRESS));
    assert_eq!(deployments[0].args[1].to_string(), "1000");

    Ok(())
}

#[tokio::test]
async fn test_missing_library_is_a_configuration_error() -> Result<()> {
    let ctx = TestContext::new();
    let orchestrator = ctx.orchestrator().await?;

    let err = orchestrator
        .deploy("Widget", &BTreeMap::new(), &[], "initialize")
        .await
        .unwrap_err();

    assert_eq!(category(&err), ErrorCategory::ConfigurationError);
    assert!(format!("{err:#}").contains("Utils"));
    assert_eq!(ctx.service.deployment_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_unknown_contract() -> Result<()> {
    let ctx = TestContext::new();
    let orchestrator = ctx.orchestrator().await?;

    let err = orchestrator
        .deploy("Gadget", &BTreeMap::new(), &[], "initialize")
        .await
        .unwrap_err();

    assert!(matches!(
        DeployError::find_in(&err),
        Some(DeployError::ContractNotFound(name)) if name == "Gadget"
    ));

    Ok(())
}

#[tokio::test]
async fn test_chain_id_mismatch_blocks_the_run() {
    let ctx = TestContext::new();

    let err = ctx.orchestrator_on_chain(2).await.err().unwrap();

    assert!(matches!(
        DeployError::find_in(&err),
        Some(DeployError::ChainIdMismatch {
            expected: 1,
            actual: 2,
            ..
        })
    ));
    assert_eq!(category(&err).exit_code(), 2);
}

#[tokio::test]
async fn test_propose_upgrade_returns_followable_url() -> Result<()> {
    let ctx = TestContext::new();
    let orchestrator = ctx.orchestrator().await?;

    let proposal = orchestrator
        .propose_upgrade(PROXY, "Widget", &libraries(&[("Utils", UTILS)]))
        .await?;

    assert_eq!(proposal.proxy, PROXY);
    assert_eq!(proposal.approval_process_id, "proc-main");
    assert_eq!(proposal.approval_address, APPROVAL_ADDRESS);
    assert_eq!(proposal.proposal_id, "prop-1");
    assert!(Url::parse(proposal.locator()).is_ok());

    let proposals = ctx.service.proposals.lock().unwrap();
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].approval_process.address, APPROVAL_ADDRESS);
    assert_eq!(
        proposal.implementation_hash,
        keccak256(&proposals[0].bytecode)
    );

    Ok(())
}

#[tokio::test]
async fn test_unbound_approval_process_stops_before_submission() -> Result<()> {
    let ctx = TestContext::new().with_service(|service| service.unbound("proc-1"));
    let orchestrator = ctx.orchestrator().await?;

    let err = orchestrator
        .propose_upgrade(PROXY, "Widget", &libraries(&[("Utils", UTILS)]))
        .await
        .unwrap_err();

    assert_eq!(category(&err), ErrorCategory::UnboundApprovalProcess);
    assert!(format!("{err:#}").contains("proc-1"));
    assert_eq!(ctx.service.proposal_count(), 0);

    let err = orchestrator
        .deploy(
            "Widget",
            &libraries(&[("Utils", UTILS)]),
            &[ArgSpec::ApprovalProcess],
            "initialize",
        )
        .await
        .unwrap_err();

    assert_eq!(category(&err), ErrorCategory::UnboundApprovalProcess);
    assert_eq!(ctx.service.deployment_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_approval_process_is_resolved_once_per_run() -> Result<()> {
    let ctx = TestContext::new();
    let orchestrator = ctx.orchestrator().await?;

    let first = orchestrator.approval_process(None).await?;
    let second = orchestrator.approval_process(None).await?;

    assert_eq!(first, second);
    assert_eq!(ctx.service.approval_queries.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_ambiguous_submission_is_not_retried() -> Result<()> {
    let ctx = TestContext::new()
        .with_service(|mut service| {
            service.ambiguous_proposals = true;
            service
        })
        .with_retry(RetryConfig::default());
    let orchestrator = ctx.orchestrator().await?;

    let err = orchestrator
        .propose_upgrade(PROXY, "Widget", &libraries(&[("Utils", UTILS)]))
        .await
        .unwrap_err();

    assert_eq!(category(&err), ErrorCategory::AmbiguousSubmission);
    assert_eq!(ctx.service.proposal_count(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_finality_timeout_without_retry() -> Result<()> {
    let ctx = TestContext::new().with_service(|mut service| {
        service.mining_delay = Duration::from_secs(3600);
        service
    });
    let orchestrator = ctx.orchestrator().await?;

    let err = orchestrator
        .deploy("Widget", &libraries(&[("Utils", UTILS)]), &[], "initialize")
        .await
        .unwrap_err();

    assert_eq!(category(&err), ErrorCategory::FinalityTimeout);
    assert_eq!(category(&err).exit_code(), 6);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_retry_picks_up_late_proxy_instead_of_redeploying() -> Result<()> {
    let ctx = TestContext::new()
        .with_service(|mut service| {
            service.mining_delay = Duration::from_millis(1500);
            service
        })
        .with_retry(RetryConfig {
            max_attempts: 2,
            min_delay_ms: 1000,
            max_delay_ms: 1000,
        });
    let orchestrator = ctx.orchestrator().await?;

    let instance = orchestrator
        .deploy("Widget", &libraries(&[("Utils", UTILS)]), &[], "initialize")
        .await?;

    assert_eq!(ctx.service.deployment_count(), 1);
    assert_eq!(instance.address, created_address(FACTORY, 0));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_retry_keeps_waiting_on_pending_proxy() -> Result<()> {
    let ctx = TestContext::new()
        .with_service(|mut service| {
            service.mining_delay = Duration::from_millis(2500);
            service
        })
        .with_retry(RetryConfig {
            max_attempts: 2,
            min_delay_ms: 1000,
            max_delay_ms: 1000,
        });
    let orchestrator = ctx.orchestrator().await?;

    let instance = orchestrator
        .deploy("Widget", &libraries(&[("Utils", UTILS)]), &[], "initialize")
        .await?;

    assert_eq!(ctx.service.deployment_count(), 1);
    assert_eq!(instance.address, created_address(FACTORY, 0));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_never_resubmit() -> Result<()> {
    let ctx = TestContext::new()
        .with_service(|mut service| {
            service.mining_delay = Duration::from_secs(3600);
            service
        })
        .with_retry(RetryConfig {
            max_attempts: 3,
            min_delay_ms: 100,
            max_delay_ms: 100,
        });
    let orchestrator = ctx.orchestrator().await?;

    let err = orchestrator
        .deploy("Widget", &libraries(&[("Utils", UTILS)]), &[], "initialize")
        .await
        .unwrap_err();

    assert_eq!(category(&err), ErrorCategory::FinalityTimeout);
    assert_eq!(ctx.service.deployment_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_library_deployments_advance_the_deployer_nonce() -> Result<()> {
    let ctx = TestContext::new();
    let orchestrator = ctx.orchestrator().await?;

    let first = orchestrator.deploy_library("Utils").await?;
    let second = orchestrator.deploy_library("Utils").await?;

    assert_ne!(first.address, second.address);
    assert_ne!(first.tx_hash, second.tx_hash);
    assert_eq!(orchestrator.chain().transaction_count(DEPLOYER).await?, 2);

    Ok(())
}
