//! Deployable units and their initializer arguments.

use std::{collections::BTreeMap, str::FromStr};

use alloy_core::primitives::{Address, B256, Bytes, U256, keccak256};
use derive_more::Deref;
use serde::{Serialize, Serializer};

use crate::{DeployError, address::parse_address};

/// CLI token standing for the resolved approval process address.
pub const APPROVAL_PROCESS_ARG: &str = "@approval-process";

/// Library name to on-chain address bindings of one deployable unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, Serialize)]
#[serde(transparent)]
pub struct LibraryBindings(BTreeMap<String, Address>);

impl LibraryBindings {
    pub fn get(&self, name: &str) -> Option<Address> {
        self.0.get(name).copied()
    }

    pub(crate) fn insert(&mut self, name: String, address: Address) {
        self.0.insert(name, address);
    }
}

impl FromIterator<(String, Address)> for LibraryBindings {
    fn from_iter<I: IntoIterator<Item = (String, Address)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A resolved, positional initializer argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitArg {
    Address(Address),
    Uint(U256),
    Bool(bool),
    String(String),
}

impl Serialize for InitArg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            InitArg::Address(address) => serializer.serialize_str(&address.to_checksum(None)),
            InitArg::Uint(value) => serializer.serialize_str(&value.to_string()),
            InitArg::Bool(value) => serializer.serialize_bool(*value),
            InitArg::String(value) => serializer.serialize_str(value),
        }
    }
}

impl std::fmt::Display for InitArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitArg::Address(address) => write!(f, "{address}"),
            InitArg::Uint(value) => write!(f, "{value}"),
            InitArg::Bool(value) => write!(f, "{value}"),
            InitArg::String(value) => write!(f, "{value:?}"),
        }
    }
}

/// An initializer argument as given by the operator, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgSpec {
    Value(InitArg),
    /// Replaced by the bound address of the network's upgrade approval process.
    ApprovalProcess,
}

impl FromStr for ArgSpec {
    type Err = DeployError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == APPROVAL_PROCESS_ARG {
            return Ok(ArgSpec::ApprovalProcess);
        }

        // Every 0x token is an address; a mistyped one must not become a string.
        if value.starts_with("0x") {
            return parse_address(value).map(|address| ArgSpec::Value(InitArg::Address(address)));
        }

        if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
            let parsed = U256::from_str_radix(value, 10).map_err(|e| {
                DeployError::Validation(format!("invalid uint256 argument '{value}': {e}"))
            })?;
            return Ok(ArgSpec::Value(InitArg::Uint(parsed)));
        }

        let arg = match value {
            "true" => InitArg::Bool(true),
            "false" => InitArg::Bool(false),
            _ => InitArg::String(value.to_string()),
        };
        Ok(ArgSpec::Value(arg))
    }
}

/// A contract ready to be instantiated: linked bytecode plus its arguments.
///
/// Only the linker builds units, so every library the contract declares is bound.
/// Units are immutable; each deployment or upgrade attempt builds a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployableUnit {
    contract_name: String,
    bytecode: Bytes,
    declared_libraries: Vec<String>,
    libraries: LibraryBindings,
    args: Vec<InitArg>,
}

impl DeployableUnit {
    pub(crate) fn new(
        contract_name: String,
        bytecode: Bytes,
        declared_libraries: Vec<String>,
        libraries: LibraryBindings,
        args: Vec<InitArg>,
    ) -> Self {
        Self {
            contract_name,
            bytecode,
            declared_libraries,
            libraries,
            args,
        }
    }

    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    pub fn bytecode(&self) -> &Bytes {
        &self.bytecode
    }

    pub fn libraries(&self) -> &LibraryBindings {
        &self.libraries
    }

    pub fn args(&self) -> &[InitArg] {
        &self.args
    }

    /// Keccak-256 of the linked creation bytecode.
    pub fn bytecode_hash(&self) -> B256 {
        keccak256(&self.bytecode)
    }

    /// Check that every declared library has a binding and there is code to deploy.
    pub fn ensure_linked(&self) -> Result<(), DeployError> {
        let missing: Vec<String> = self
            .declared_libraries
            .iter()
            .filter(|name| self.libraries.get(name).is_none())
            .cloned()
            .collect();

        if !missing.is_empty() {
            return Err(DeployError::UnresolvedLibraries {
                contract: self.contract_name.clone(),
                missing,
                malformed: Vec::new(),
            });
        }

        if self.bytecode.is_empty() {
            return Err(DeployError::Configuration(format!(
                "contract '{}' has no creation bytecode (abstract contract or interface?)",
                self.contract_name
            )));
        }

        Ok(())
    }
}
