use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use upkit_deploy::CONFIG_FILENAME;

/// The default initializer run through a freshly deployed proxy.
const DEFAULT_INITIALIZER: &str = "initialize";

#[derive(Parser)]
#[command(name = "upkit")]
#[command(
    author,
    version,
    about = "Deploy and upgrade proxy-backed contracts across networks"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "UPKIT_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the configuration file.
    ///
    /// If not provided, `Upkit.toml` in the working directory is used when present.
    #[arg(short, long, global = true, alias = "conf", env = "UPKIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write the default configuration.
    Init {
        /// Where to write the configuration.
        #[arg(long, default_value = CONFIG_FILENAME)]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// List the configured networks.
    Networks,

    /// Check chain ids and approval processes.
    Check {
        /// Check only this network. All networks are checked concurrently otherwise.
        #[arg(short, long)]
        network: Option<String>,
    },

    /// Deploy a library and record its address.
    DeployLibrary {
        #[arg(short, long, env = "UPKIT_NETWORK")]
        network: String,

        /// Library contract name.
        #[arg(long)]
        contract: String,
    },

    /// Deploy a contract behind a new proxy.
    Deploy {
        #[arg(short, long, env = "UPKIT_NETWORK")]
        network: String,

        /// Implementation contract name.
        #[arg(long)]
        contract: String,

        /// Library binding as `Name=0x...`. Recorded libraries are used otherwise.
        #[arg(long = "library", value_name = "NAME=ADDRESS")]
        libraries: Vec<String>,

        /// Initializer argument, in order. `@approval-process` stands for the
        /// address of the network's upgrade approval process.
        #[arg(long = "arg", value_name = "VALUE", allow_hyphen_values = true)]
        args: Vec<String>,

        /// Initializer function name.
        #[arg(long, default_value = DEFAULT_INITIALIZER)]
        initializer: String,
    },

    /// Propose an upgrade of an existing proxy.
    ProposeUpgrade {
        #[arg(short, long, env = "UPKIT_NETWORK")]
        network: String,

        /// Proxy address.
        #[arg(long)]
        proxy: String,

        /// New implementation contract name.
        #[arg(long)]
        contract: String,

        /// Library binding as `Name=0x...`. Recorded libraries are used otherwise.
        #[arg(long = "library", value_name = "NAME=ADDRESS")]
        libraries: Vec<String>,
    },

    /// Show the approval process governing upgrades.
    ApprovalProcess {
        #[arg(short, long, env = "UPKIT_NETWORK")]
        network: String,

        /// Scope the query to one proxy.
        #[arg(long)]
        proxy: Option<String>,
    },
}
