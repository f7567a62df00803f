//! greendish deploys the GreenDish contracts and keeps every client file in sync
//! with their addresses.

mod cli;
mod config;

use std::{collections::BTreeMap, process::ExitCode};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};

use cli::Cli;
use greendish_deploy::{
    ConfigError, DeployConfig, DeployError, Deployer, DeploymentError, ExplorerClient,
    PublishError, Publisher, RpcChainClient, RpcChainClientConfig,
    plan::{MARKETPLACE, TOKEN},
    update_addresses,
};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is not an error.
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::load(&cli)?;

    if let Some(path) = &cli.save_config {
        config.save_to_file(path)?;
    }

    if let Some((token, marketplace)) = cli.update_addresses() {
        tracing::info!(%token, %marketplace, "Address-update mode, skipping deployment");
        update_addresses(&Publisher::from_config(&config), token, marketplace)?;
        return Ok(());
    }

    let deployer = match cli.resume_addresses() {
        Some((token, marketplace)) => Deployer::new(config.clone())?.resume_from(token, marketplace),
        None => Deployer::new(config.clone())?.resume(cli.resume),
    };
    let client = chain_client(&config, cli.private_key.clone())?;

    if cli.inspect {
        let report = deployer.inspect(&client).await?;
        println!("{}", report.render_table());
        if report.is_complete() {
            tracing::info!(chain_id = report.chain_id, "Every step is satisfied on chain");
        } else {
            tracing::info!(chain_id = report.chain_id, "Some steps still need to run");
        }
        return Ok(());
    }

    let result = deployer.deploy(&client).await?;

    match cli.etherscan_api_key {
        Some(api_key) => match ExplorerClient::new(api_key) {
            Ok(explorer) => explorer.report(&result).await,
            Err(e) => tracing::warn!(error = %e, "Could not create explorer client"),
        },
        None => tracing::info!("ETHERSCAN_API_KEY not set, skipping explorer verification check"),
    }

    Ok(())
}

fn chain_client(config: &DeployConfig, private_key: Option<String>) -> Result<RpcChainClient> {
    tracing::info!(
        rpc_url = %config.rpc_url,
        local_signer = private_key.is_some(),
        "Connecting to network..."
    );
    RpcChainClient::new(RpcChainClientConfig {
        rpc_url: config.rpc_url.clone(),
        artifacts_dir: config.artifacts_dir.clone(),
        private_key,
        poll_interval: config.poll_interval(),
    })
    .context("Failed to create chain client")
}

/// Command line that resumes a run which stopped after deploying `confirmed`.
fn resume_command(confirmed: &BTreeMap<String, Address>) -> Option<String> {
    let token = confirmed.get(TOKEN)?;
    Some(match confirmed.get(MARKETPLACE) {
        Some(marketplace) => format!("greendish --resume {token} {marketplace}"),
        None => format!("greendish --resume {token}"),
    })
}

fn report_deployment(err: &DeploymentError) {
    match err.step() {
        Some(step) => tracing::error!(kind = err.kind(), step, error = %err, "Deployment failed"),
        None => tracing::error!(kind = err.kind(), error = %err, "Deployment failed"),
    }
}

fn report_publish(err: &PublishError) {
    for failure in &err.failures {
        tracing::error!(
            kind = err.kind(),
            artifact = %failure.artifact,
            path = %failure.path.display(),
            error = %failure.cause,
            "Failed to publish artifact"
        );
    }
}

/// Log `err` with its kind and the failing step or artifact.
fn report(err: &anyhow::Error) {
    if let Some(err) = err.downcast_ref::<DeployError>() {
        match err {
            DeployError::Deployment { error, confirmed } => {
                report_deployment(error);
                if let Some(command) = resume_command(confirmed) {
                    tracing::error!(
                        confirmed = ?confirmed,
                        "Contracts above are already on chain; resume with `{command}`"
                    );
                }
            }
            DeployError::Publish { result, error } => {
                tracing::error!(
                    token = ?result.token_address(),
                    marketplace = ?result.marketplace_address(),
                    "On-chain deployment succeeded but its artifacts are out of date; \
                     rerun with the addresses above to republish"
                );
                report_publish(error);
            }
        }
    } else if let Some(e) = err.downcast_ref::<DeploymentError>() {
        report_deployment(e);
    } else if let Some(e) = err.downcast_ref::<PublishError>() {
        report_publish(e);
    } else if let Some(e) = err.downcast_ref::<ConfigError>() {
        tracing::error!(kind = "configuration", error = %e, "Invalid configuration");
    } else {
        tracing::error!(error = ?err, "greendish failed");
    }
}
