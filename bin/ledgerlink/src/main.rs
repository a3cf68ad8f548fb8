//! ledgerlink deploys the evidence vault and ledger core contracts and links them.

mod cli;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};

use cli::{Cli, Command};
use ledgerlink_deploy::{
    Address, ArtifactStore, DeployConfig, DeployError, DeploymentReport, EvidenceRecord,
    Orchestrator, RpcChainClient, ingest_record,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    ExitCode::from(exit_status(&run(cli).await))
}

/// Log the outcome of a run and map it to the process exit status.
///
/// A failed deployment is logged with the stage it stopped at.
fn exit_status(result: &Result<()>) -> u8 {
    let Err(err) = result else {
        return 0;
    };

    match err.downcast_ref::<DeployError>() {
        Some(deploy_err) => tracing::error!(
            stage = %deploy_err.stage,
            kind = %deploy_err.kind(),
            "{:#}",
            err
        ),
        None => tracing::error!("{:#}", err),
    }
    1
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command() {
        Command::Init { path } => DeployConfig::default().save_to_file(&path),
        Command::Deploy => deploy(load_config(&cli)?).await,
        Command::Ingest {
            core,
            record_id,
            amount,
            sender,
            evidence_uri,
        } => {
            let record = EvidenceRecord {
                record_id,
                amount,
                sender,
                evidence_uri,
            };
            ingest(load_config(&cli)?, core, record).await
        }
    }
}

async fn deploy(config: DeployConfig) -> Result<()> {
    tracing::info!(
        rpc_url = %config.chain.rpc_url,
        artifacts = %config.contracts.artifacts_dir.display(),
        "Connecting to node..."
    );

    let mut orchestrator = Orchestrator::connect(config).await?;
    let report = orchestrator.run().await?;
    println!("{}", summary(&report));
    Ok(())
}

async fn ingest(config: DeployConfig, core: Address, record: EvidenceRecord) -> Result<()> {
    let artifacts = ArtifactStore::new(config.contracts.artifacts_dir);
    let client = RpcChainClient::connect(&config.chain, artifacts).await?;
    let receipt = ingest_record(&client, core, &record).await?;
    tracing::info!(
        tx_hash = %receipt.tx_hash,
        block = receipt.block_number,
        fingerprint = %record.fingerprint(),
        "Record {} validated",
        record.record_id
    );
    Ok(())
}

/// Layer command line overrides on top of the file and environment configuration.
fn load_config(cli: &Cli) -> Result<DeployConfig> {
    let mut config = DeployConfig::load(cli.config.as_deref())?;

    if let Some(rpc_url) = &cli.rpc_url {
        config.chain.rpc_url = rpc_url.clone();
    }
    if let Some(from) = cli.from {
        config.chain.from = Some(from);
    }
    if let Some(artifacts) = &cli.artifacts {
        config.contracts.artifacts_dir = artifacts.clone();
    }

    config.validate()?;
    Ok(config)
}

fn summary(report: &DeploymentReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Step", "Contract", "Address", "Tx hash", "Block"]);

    for (step, deployed) in [("vault", &report.vault), ("core", &report.core)] {
        table.add_row(vec![
            step.to_string(),
            deployed.contract.to_string(),
            deployed.address.to_string(),
            deployed.receipt.tx_hash.to_string(),
            deployed.receipt.block_number.to_string(),
        ]);
    }

    let (tx_hash, block) = report
        .link
        .receipt()
        .map(|r| (r.tx_hash.to_string(), r.block_number.to_string()))
        .unwrap_or_default();
    table.add_row(vec![
        "link".to_string(),
        format!("{}({})", report.link.method, report.link.argument),
        report.link.target.to_string(),
        tx_hash,
        block,
    ]);

    table
}
