//! Address book of past deployments (`deployments.jsonl`).
//!
//! One JSON record per line. Records are only ever appended to the end of the
//! file and existing bytes are never rewritten. Writers hold an exclusive lock;
//! readers take a shared lock, so concurrent runs against different networks
//! can share one book. A line torn by an interrupted write is skipped on read.

use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::PathBuf,
};

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::{LibraryDeployment, ProxyInstance, UpgradeProposal};

/// What a record is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RecordEntry {
    Library {
        name: String,
        address: Address,
        tx_hash: B256,
    },
    Proxy {
        contract: String,
        address: Address,
        deployment_id: String,
    },
    UpgradeProposal {
        contract: String,
        proxy: Address,
        proposal_id: String,
        url: String,
        approval_process_id: String,
    },
}

impl From<&LibraryDeployment> for RecordEntry {
    fn from(library: &LibraryDeployment) -> Self {
        RecordEntry::Library {
            name: library.name.clone(),
            address: library.address,
            tx_hash: library.tx_hash,
        }
    }
}

impl From<&ProxyInstance> for RecordEntry {
    fn from(proxy: &ProxyInstance) -> Self {
        RecordEntry::Proxy {
            contract: proxy.contract_name.clone(),
            address: proxy.address,
            deployment_id: proxy.deployment_id.clone(),
        }
    }
}

impl From<&UpgradeProposal> for RecordEntry {
    fn from(proposal: &UpgradeProposal) -> Self {
        RecordEntry::UpgradeProposal {
            contract: proposal.contract_name.clone(),
            proxy: proposal.proxy,
            proposal_id: proposal.proposal_id.clone(),
            url: proposal.url.to_string(),
            approval_process_id: proposal.approval_process_id.clone(),
        }
    }
}

/// One line of the address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub network: String,
    /// Unix timestamp, in seconds.
    pub recorded_at: i64,
    #[serde(flatten)]
    pub entry: RecordEntry,
}

/// Append-only JSON-lines file of deployment records.
#[derive(Debug, Clone)]
pub struct AddressBook {
    path: PathBuf,
}

impl AddressBook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load every record. A missing file is an empty book.
    pub fn load(&self) -> Result<Vec<DeploymentRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut file = File::open(&self.path)
            .with_context(|| format!("Failed to open address book {}", self.path.display()))?;
        FileExt::lock_shared(&file)
            .with_context(|| format!("Failed to lock address book {}", self.path.display()))?;

        let records = self.read_records(&mut file);
        FileExt::unlock(&file).ok();
        records
    }

    /// Append a record for `network` and return it.
    pub fn append(&self, network: &str, entry: impl Into<RecordEntry>) -> Result<DeploymentRecord> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open address book {}", self.path.display()))?;
        FileExt::lock_exclusive(&file)
            .with_context(|| format!("Failed to lock address book {}", self.path.display()))?;

        let record = DeploymentRecord {
            network: network.to_string(),
            recorded_at: chrono::Utc::now().timestamp(),
            entry: entry.into(),
        };

        let result = Self::encode(&record).and_then(|line| {
            // Terminate a torn last line so the new record starts on its own line.
            let line = if Self::ends_with_newline(&mut file)? {
                line
            } else {
                format!("\n{line}")
            };
            file.write_all(line.as_bytes())?;
            file.sync_data()?;
            Ok(())
        });

        FileExt::unlock(&file).ok();
        result.with_context(|| format!("Failed to write address book {}", self.path.display()))?;

        tracing::debug!(path = %self.path.display(), network, "Address book updated");

        Ok(record)
    }

    /// Latest recorded address of every library deployed on `network`, as the
    /// name to address mapping the linker consumes.
    pub fn library_addresses(&self, network: &str) -> Result<BTreeMap<String, String>> {
        let mut libraries = BTreeMap::new();
        for record in self.load()? {
            if record.network != network {
                continue;
            }
            if let RecordEntry::Library { name, address, .. } = record.entry {
                libraries.insert(name, address.to_string());
            }
        }
        Ok(libraries)
    }

    fn encode(record: &DeploymentRecord) -> Result<String> {
        let mut line = serde_json::to_string(record).context("Failed to serialize record")?;
        line.push('\n');
        Ok(line)
    }

    /// Whether the file is empty or its last byte is a newline.
    fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
        if file.metadata()?.len() == 0 {
            return Ok(true);
        }
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        Ok(last[0] == b'\n')
    }

    fn read_records(&self, file: &mut File) -> Result<Vec<DeploymentRecord>> {
        let mut content = String::new();
        file.read_to_string(&mut content)
            .with_context(|| format!("Failed to read address book {}", self.path.display()))?;

        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping unreadable address book record"
                ),
            }
        }
        Ok(records)
    }
}
