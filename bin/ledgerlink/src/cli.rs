use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ledgerlink_deploy::{Address, LEDGERLINK_CONFIG_FILENAME};
use tracing::level_filters::LevelFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "ledgerlink")]
#[command(
    author,
    version,
    about = "Deploy the evidence vault and ledger core contracts and link them"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "LEDGERLINK_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to a configuration file, or a directory containing Ledgerlink.toml.
    ///
    /// If not provided, Ledgerlink.toml in the current directory is used when present.
    #[arg(long, alias = "conf", global = true, env = "LEDGERLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// The JSON-RPC endpoint of the node.
    #[arg(long, alias = "rpc", global = true, env = "LEDGERLINK_RPC_URL")]
    pub rpc_url: Option<Url>,

    /// The unlocked account that sends every transaction.
    ///
    /// If not provided, the node's first account is used.
    #[arg(long, global = true, env = "LEDGERLINK_FROM")]
    pub from: Option<Address>,

    /// The directory holding the compiled contract artifacts.
    #[arg(long, global = true, env = "LEDGERLINK_ARTIFACTS")]
    pub artifacts: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Deploy the vault, deploy the core against it and link them (default).
    Deploy,

    /// Write the default configuration to a file.
    Init {
        /// Where to write the configuration.
        #[arg(long, default_value = LEDGERLINK_CONFIG_FILENAME)]
        path: PathBuf,
    },

    /// Fingerprint a financial record and validate it on a deployed core.
    Ingest {
        /// Address of the deployed core contract.
        #[arg(long)]
        core: Address,

        #[arg(long)]
        record_id: String,

        /// The amount, hashed exactly as written.
        #[arg(long)]
        amount: String,

        #[arg(long)]
        sender: String,

        /// Link to the supporting document, e.g. ipfs://<cid>.
        #[arg(long)]
        evidence_uri: String,
    },
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Deploy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_is_the_default_command() {
        let cli = Cli::try_parse_from(["ledgerlink"]).unwrap();
        assert_eq!(cli.command(), Command::Deploy);
        assert_eq!(cli.verbosity, LevelFilter::INFO);
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ledgerlink",
            "deploy",
            "--rpc-url",
            "http://localhost:9545",
            "--from",
            "0x00000000000000000000000000000000000000aa",
            "--artifacts",
            "out",
        ])
        .unwrap();

        assert_eq!(cli.rpc_url.unwrap().as_str(), "http://localhost:9545/");
        assert_eq!(cli.from, Some(Address::with_last_byte(0xaa)));
        assert_eq!(cli.artifacts, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_ingest_arguments() {
        let cli = Cli::try_parse_from([
            "ledgerlink",
            "ingest",
            "--core",
            "0x00000000000000000000000000000000000000bb",
            "--record-id",
            "INV-2026-001",
            "--amount",
            "5000.0",
            "--sender",
            "Acme Corp",
            "--evidence-uri",
            "ipfs://QmHash",
        ])
        .unwrap();

        match cli.command() {
            Command::Ingest { core, amount, .. } => {
                assert_eq!(core, Address::with_last_byte(0xbb));
                assert_eq!(amount, "5000.0");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_ingest_requires_core_address() {
        assert!(Cli::try_parse_from(["ledgerlink", "ingest", "--core", "not-an-address"]).is_err());
    }
}
