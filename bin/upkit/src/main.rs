//! upkit deploys proxy-backed contracts and proposes their upgrades across networks.

mod cli;
mod output;

use std::{collections::BTreeMap, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command};
use upkit_deploy::{
    AddressBook, ArgSpec, DeployError, HttpApprovalService, NetworkRegistry, OrchestratorBuilder,
    OrchestratorConfig, RecordEntry, address::parse_address, check_all,
};

/// Exit status of a run interrupted by the operator.
const INTERRUPTED_EXIT_CODE: u8 = 130;

/// Exit status of a rejected command line (`EX_USAGE`), kept apart from the
/// error category codes.
const USAGE_EXIT_CODE: u8 = 64;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            err.print().ok();
            return ExitCode::from(usage_status(&err));
        }
    };

    // Initialize the logger. Results go to stdout.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    tokio::select! {
        result = run(cli) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => report(&err),
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!(
                "Interrupted. Transactions already broadcast are not retracted; \
                 the next run reconciles against chain state."
            );
            ExitCode::from(INTERRUPTED_EXIT_CODE)
        }
    }
}

/// `--help` and `--version` succeed; anything else clap rejects is a usage error.
fn usage_status(err: &clap::Error) -> u8 {
    if err.use_stderr() { USAGE_EXIT_CODE } else { 0 }
}

/// Write the error category and chain to stderr and map it to an exit status.
fn report(err: &anyhow::Error) -> ExitCode {
    match DeployError::find_in(err).map(DeployError::category) {
        Some(category) => {
            eprintln!("error[{category}]: {err:#}");
            ExitCode::from(category.exit_code())
        }
        None => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let load = || OrchestratorConfig::load(cli.config.as_deref());

    match cli.command {
        Command::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            OrchestratorConfig::default().save_to_file(&path)?;
            println!("Wrote {}", path.display());
        }

        Command::Networks => output::networks(&load()?.networks),

        Command::Check { network } => {
            let config = load()?;
            let registry = match network {
                Some(name) => NetworkRegistry::new(vec![config.networks.lookup(&name)?.clone()])?,
                None => config.networks.clone(),
            };
            let service = Arc::new(HttpApprovalService::new(&config.approval_service)?);

            let checks = check_all(&registry, service).await;
            output::checks(&checks);

            if let Some(failed) = checks.into_iter().find(|check| !check.healthy()) {
                let name = failed.network.clone();
                if let Some(err) = failed.into_error() {
                    return Err(anyhow::Error::new(err)
                        .context(format!("Network '{name}' failed its check")));
                }
            }
        }

        Command::DeployLibrary { network, contract } => {
            let config = load()?;
            let book = AddressBook::new(&config.deployments_path);
            let orchestrator = OrchestratorBuilder::new(config)
                .network(&network)
                .build()
                .await?;

            let library = orchestrator.deploy_library(&contract).await?;
            publish(&book, &network, &library, output::library)?;
        }

        Command::Deploy {
            network,
            contract,
            libraries,
            args,
            initializer,
        } => {
            let config = load()?;
            let book = AddressBook::new(&config.deployments_path);
            let libraries = known_libraries(&book, &network, &libraries)?;
            let args = args
                .iter()
                .map(|arg| arg.parse::<ArgSpec>())
                .collect::<Result<Vec<_>, _>>()?;

            let orchestrator = OrchestratorBuilder::new(config)
                .network(&network)
                .build()
                .await?;

            let instance = orchestrator
                .deploy(&contract, &libraries, &args, &initializer)
                .await?;
            publish(&book, &network, &instance, output::proxy)?;
        }

        Command::ProposeUpgrade {
            network,
            proxy,
            contract,
            libraries,
        } => {
            let proxy = parse_address(&proxy).context("Invalid --proxy")?;
            let config = load()?;
            let book = AddressBook::new(&config.deployments_path);
            let libraries = known_libraries(&book, &network, &libraries)?;

            let orchestrator = OrchestratorBuilder::new(config)
                .network(&network)
                .build()
                .await?;

            let proposal = orchestrator
                .propose_upgrade(proxy, &contract, &libraries)
                .await?;
            publish(&book, &network, &proposal, output::proposal)?;
        }

        Command::ApprovalProcess { network, proxy } => {
            let config = load()?;
            let proxy = proxy
                .as_deref()
                .map(parse_address)
                .transpose()
                .context("Invalid --proxy")?;

            let orchestrator = OrchestratorBuilder::new(config)
                .network(&network)
                .build()
                .await?;

            let process = orchestrator.approval_process(proxy).await?;
            output::approval_process(&process);
        }
    }

    Ok(())
}

/// Print a result, then record it in the address book.
fn publish<'a, T>(
    book: &AddressBook,
    network: &str,
    result: &'a T,
    print: impl FnOnce(&T),
) -> Result<()>
where
    &'a T: Into<RecordEntry>,
{
    print(result);
    book.append(network, result)?;
    Ok(())
}

/// Libraries recorded for `network`, overridden by `Name=0x...` bindings.
fn known_libraries(
    book: &AddressBook,
    network: &str,
    overrides: &[String],
) -> Result<BTreeMap<String, String>> {
    let mut libraries = book.library_addresses(network)?;
    for binding in overrides {
        let (name, address) = binding.split_once('=').ok_or_else(|| {
            DeployError::Validation(format!(
                "invalid library binding '{binding}', expected Name=0x..."
            ))
        })?;
        libraries.insert(name.trim().to_string(), address.trim().to_string());
    }
    Ok(libraries)
}
