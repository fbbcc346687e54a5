//! Library linker.
//!
//! Binding is pure: it resolves the libraries a contract declares against a
//! caller-supplied name to address mapping and splices the addresses into the
//! creation bytecode. Deploying a fresh library is the only operation here that
//! touches the chain, and the caller is responsible for recording the address it
//! returns.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, B256, Bytes};

use crate::{
    ArtifactSource, ChainClient, ContractArtifact, DeployError, DeployableUnit, FinalityConfig,
    InitArg, LibraryBindings, TransactionReceipt, address::parse_address, finality,
};

/// Length in bytes of an address placeholder.
const ADDRESS_LENGTH: usize = 20;

/// Resolve every library `artifact` declares against `known`.
///
/// Entries of `known` the contract does not declare are ignored. Fails with a
/// single [`DeployError::UnresolvedLibraries`] naming every missing and every
/// malformed entry.
pub fn bind_libraries(
    artifact: &ContractArtifact,
    known: &BTreeMap<String, String>,
) -> Result<LibraryBindings, DeployError> {
    let mut bindings = LibraryBindings::default();
    let mut missing = Vec::new();
    let mut malformed = Vec::new();

    for name in artifact.library_names() {
        match known.get(name) {
            None => missing.push(name.to_string()),
            Some(raw) => match parse_address(raw) {
                Ok(address) => bindings.insert(name.to_string(), address),
                Err(err) => {
                    tracing::debug!(library = name, error = %err, "Malformed library address");
                    malformed.push(name.to_string());
                }
            },
        }
    }

    if !missing.is_empty() || !malformed.is_empty() {
        return Err(DeployError::UnresolvedLibraries {
            contract: artifact.contract_name.clone(),
            missing,
            malformed,
        });
    }

    Ok(bindings)
}

/// Splice library addresses into the artifact's creation bytecode.
pub fn link_bytecode(
    artifact: &ContractArtifact,
    bindings: &LibraryBindings,
) -> Result<Bytes, DeployError> {
    let mut code = artifact
        .bytecode
        .strip_prefix("0x")
        .unwrap_or(&artifact.bytecode)
        .to_string();

    if !code.is_ascii() {
        return Err(DeployError::Configuration(format!(
            "bytecode of '{}' contains non-hex characters",
            artifact.contract_name
        )));
    }

    for (name, offsets) in &artifact.link_references {
        let address = bindings.get(name).ok_or_else(|| DeployError::UnresolvedLibraries {
            contract: artifact.contract_name.clone(),
            missing: vec![name.clone()],
            malformed: Vec::new(),
        })?;
        let address_hex = hex::encode(address);

        for offset in offsets {
            let range = offset
                .start
                .checked_mul(2)
                .zip(offset.length.checked_mul(2))
                .and_then(|(start, length)| Some(start..start.checked_add(length)?))
                .filter(|range| offset.length == ADDRESS_LENGTH && range.end <= code.len());
            let Some(range) = range else {
                return Err(DeployError::Configuration(format!(
                    "invalid link reference for '{}' in '{}' (start {}, length {})",
                    name, artifact.contract_name, offset.start, offset.length
                )));
            };
            code.replace_range(range, &address_hex);
        }
    }

    hex::decode(&code).map(Bytes::from).map_err(|e| {
        DeployError::Configuration(format!(
            "bytecode of '{}' is not valid hex after linking: {}",
            artifact.contract_name, e
        ))
    })
}

/// Build a [`DeployableUnit`] from an artifact, a library mapping and arguments.
pub fn link(
    artifact: &ContractArtifact,
    known: &BTreeMap<String, String>,
    args: Vec<InitArg>,
) -> Result<DeployableUnit, DeployError> {
    let bindings = bind_libraries(artifact, known)?;
    let bytecode = link_bytecode(artifact, &bindings)?;
    let declared = artifact.library_names().map(String::from).collect();

    Ok(DeployableUnit::new(
        artifact.contract_name.clone(),
        bytecode,
        declared,
        bindings,
        args,
    ))
}

/// Load `contract_name` from the artifact set and link it.
pub fn build_unit<A: ArtifactSource + ?Sized>(
    artifacts: &A,
    contract_name: &str,
    known: &BTreeMap<String, String>,
    args: Vec<InitArg>,
) -> Result<DeployableUnit, DeployError> {
    let artifact = artifacts.load(contract_name)?;
    link(&artifact, known, args)
}

/// A freshly deployed library, to be recorded by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDeployment {
    pub name: String,
    pub address: Address,
    pub tx_hash: B256,
}

/// Broadcast the creation transaction of a library.
pub async fn send_library<C: ChainClient>(
    chain: &C,
    from: Address,
    unit: &DeployableUnit,
) -> Result<B256, DeployError> {
    unit.ensure_linked()?;

    // The node assigns the nonce.
    let nonce = chain.transaction_count(from).await?;
    tracing::info!(library = unit.contract_name(), from = %from, nonce, "Deploying library...");

    let tx_hash = chain
        .send_deployment(from, unit.bytecode().clone())
        .await
        .map_err(|err| match err {
            DeployError::DeploymentReverted { reason, .. } => DeployError::DeploymentReverted {
                contract: unit.contract_name().to_string(),
                reason,
            },
            other => other,
        })?;
    tracing::debug!(library = unit.contract_name(), tx_hash = %tx_hash, "Library deployment sent");

    Ok(tx_hash)
}

/// Wait for a broadcast library deployment to be final.
pub async fn await_library<C: ChainClient>(
    chain: &C,
    name: &str,
    tx_hash: B256,
    finality_config: &FinalityConfig,
) -> Result<LibraryDeployment, DeployError> {
    let receipt = finality::wait_for_receipt(chain, tx_hash, finality_config).await?;
    let address = deployed_address(name, &receipt)?;

    finality::wait_for_code(chain, address, finality_config).await?;

    tracing::info!(library = name, address = %address, "Library deployed");

    Ok(LibraryDeployment {
        name: name.to_string(),
        address,
        tx_hash,
    })
}

fn deployed_address(name: &str, receipt: &TransactionReceipt) -> Result<Address, DeployError> {
    if !receipt.status {
        return Err(DeployError::DeploymentReverted {
            contract: name.to_string(),
            reason: format!("transaction {} reverted", receipt.transaction_hash),
        });
    }

    receipt
        .contract_address
        .ok_or_else(|| DeployError::DeploymentReverted {
            contract: name.to_string(),
            reason: format!(
                "receipt of {} has no contract address",
                receipt.transaction_hash
            ),
        })
}
