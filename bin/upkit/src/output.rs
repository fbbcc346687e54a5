//! Terminal output. Results go to stdout, diagnostics to stderr via tracing.

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use upkit_deploy::{
    ApprovalProcess, LibraryDeployment, NetworkCheck, NetworkRegistry, ProxyInstance,
    UpgradeProposal,
};

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

pub fn networks(registry: &NetworkRegistry) {
    let mut table = table(&["Network", "Chain id", "Endpoint", "Verification"]);
    for profile in registry.iter() {
        let verification = match &profile.verification {
            Some(v) if v.api_key.is_some() => "api key",
            Some(_) => "explorer only",
            None => "-",
        };
        table.add_row(vec![
            profile.name.clone(),
            profile.chain_id.to_string(),
            profile.rpc_url.clone(),
            verification.to_string(),
        ]);
    }
    println!("{table}");
}

pub fn checks(checks: &[NetworkCheck]) {
    let mut table = table(&["Network", "Chain id", "Approval process", "Status"]);
    for check in checks {
        let chain_id = match &check.chain_id {
            Ok(id) => id.to_string(),
            Err(_) => format!("expected {}", check.expected_chain_id),
        };
        let approval = match &check.approval_process {
            Ok(process) => format!("{} ({})", process.id, process.address),
            Err(_) => "-".to_string(),
        };
        let status = match check.error() {
            None => "ok".to_string(),
            Some(err) => format!("{}: {}", err.category(), err),
        };
        table.add_row(vec![check.network.clone(), chain_id, approval, status]);
    }
    println!("{table}");
}

pub fn library(library: &LibraryDeployment) {
    println!("{} deployed at {}", library.name, library.address);
}

pub fn proxy(instance: &ProxyInstance) {
    println!(
        "{} proxy deployed at {} on {}",
        instance.contract_name, instance.address, instance.network
    );
}

pub fn proposal(proposal: &UpgradeProposal) {
    println!("Upgrade proposal: {}", proposal.locator());
}

pub fn approval_process(process: &ApprovalProcess) {
    println!("Approval process {} at {}", process.id, process.address);
}
