//! Compiled contract artifacts.
//!
//! The orchestrator treats contracts as opaque bytecode plus the list of library
//! placeholders the compiler left in it. [`HardhatArtifacts`] reads them from a
//! Hardhat `artifacts/` directory.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::DeployError;

/// Position of a library address placeholder inside creation bytecode, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkOffset {
    pub start: usize,
    pub length: usize,
}

/// A compiled contract, not yet linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractArtifact {
    pub contract_name: String,
    /// Hex creation bytecode, `0x`-prefixed, with `__$..$__` placeholders for libraries.
    pub bytecode: String,
    /// Placeholder offsets keyed by library name.
    pub link_references: BTreeMap<String, Vec<LinkOffset>>,
}

impl ContractArtifact {
    /// Names of the libraries this contract must be linked against.
    pub fn library_names(&self) -> impl Iterator<Item = &str> {
        self.link_references.keys().map(String::as_str)
    }
}

/// The compiled-artifact collaborator.
pub trait ArtifactSource: Send + Sync {
    /// Load the artifact for `contract_name`, failing with
    /// [`DeployError::ContractNotFound`] if it is not part of the build.
    fn load(&self, contract_name: &str) -> Result<ContractArtifact, DeployError>;
}

impl ArtifactSource for BTreeMap<String, ContractArtifact> {
    fn load(&self, contract_name: &str) -> Result<ContractArtifact, DeployError> {
        self.get(contract_name)
            .cloned()
            .ok_or_else(|| DeployError::ContractNotFound(contract_name.to_string()))
    }
}

/// On-disk layout of a Hardhat artifact file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifactFile {
    contract_name: String,
    bytecode: String,
    #[serde(default)]
    link_references: BTreeMap<String, BTreeMap<String, Vec<LinkOffset>>>,
}

impl HardhatArtifactFile {
    fn into_artifact(self) -> Result<ContractArtifact, DeployError> {
        let mut link_references: BTreeMap<String, Vec<LinkOffset>> = BTreeMap::new();

        for (source, libraries) in self.link_references {
            for (library, offsets) in libraries {
                if link_references.contains_key(&library) {
                    return Err(DeployError::Configuration(format!(
                        "library name '{}' used by '{}' is ambiguous (also declared in {})",
                        library, self.contract_name, source
                    )));
                }
                link_references.insert(library, offsets);
            }
        }

        Ok(ContractArtifact {
            contract_name: self.contract_name,
            bytecode: self.bytecode,
            link_references,
        })
    }
}

/// Reads Hardhat artifacts (`artifacts/**/<Contract>.json`).
#[derive(Debug, Clone)]
pub struct HardhatArtifacts {
    root: PathBuf,
}

impl HardhatArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn find(&self, dir: &Path, file_name: &str) -> Result<Option<PathBuf>, DeployError> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            DeployError::Configuration(format!(
                "failed to read artifacts directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let mut subdirs = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                // build-info holds full compiler outputs, never single artifacts
                if path.file_name().is_some_and(|name| name != "build-info") {
                    subdirs.push(path);
                }
            } else if path.file_name().is_some_and(|name| name == file_name) {
                return Ok(Some(path));
            }
        }

        for subdir in subdirs {
            if let Some(found) = self.find(&subdir, file_name)? {
                return Ok(Some(found));
            }
        }

        Ok(None)
    }
}

impl ArtifactSource for HardhatArtifacts {
    fn load(&self, contract_name: &str) -> Result<ContractArtifact, DeployError> {
        let file_name = format!("{contract_name}.json");
        let path = self
            .find(&self.root, &file_name)?
            .ok_or_else(|| DeployError::ContractNotFound(contract_name.to_string()))?;

        let content = std::fs::read_to_string(&path).map_err(|e| {
            DeployError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;

        let file: HardhatArtifactFile = serde_json::from_str(&content).map_err(|e| {
            DeployError::Configuration(format!("failed to parse {}: {}", path.display(), e))
        })?;

        tracing::debug!(contract = contract_name, path = %path.display(), "Artifact loaded");

        file.into_artifact()
    }
}
