//! Human readable deployment summary.

use std::fmt::{self, Write};

use alloy_core::primitives::Address;

use crate::{
    error::ArtifactError,
    executor::RESTAURANT_NAME_LABEL,
    plan::{MARKETPLACE, TOKEN},
    result::DeploymentResult,
};

use super::manifest::format_timestamp;

/// Render the summary report. Always written in full.
pub fn render(result: &DeploymentResult) -> Result<String, ArtifactError> {
    let require = |name: &str| {
        result.address(name).ok_or_else(|| ArtifactError::MissingAddress {
            name: name.to_string(),
        })
    };
    let token = require(TOKEN)?;
    let marketplace = require(MARKETPLACE)?;

    let mut out = String::new();
    write_summary(&mut out, result, token, marketplace)
        .map_err(|e| ArtifactError::Io(std::io::Error::other(e)))?;
    Ok(out)
}

fn write_summary(
    out: &mut String,
    result: &DeploymentResult,
    token: Address,
    marketplace: Address,
) -> fmt::Result {
    writeln!(out, "GreenDish Project Deployment Summary")?;
    writeln!(out, "===================================")?;
    writeln!(out, "Deployment Date: {}", format_timestamp(result.timestamp()))?;
    match (result.network_name(), result.network_id()) {
        (Some(name), Some(id)) => writeln!(out, "Network: {name} (chain id {id})")?,
        (Some(name), None) => writeln!(out, "Network: {name}")?,
        (None, Some(id)) => writeln!(out, "Network: chain id {id}")?,
        (None, None) => {}
    }
    if let Some(restaurant) = result.labels().get(RESTAURANT_NAME_LABEL) {
        writeln!(out, "Restaurant: {restaurant}")?;
    }

    writeln!(out)?;
    writeln!(out, "Contract Addresses:")?;
    writeln!(out, "------------------")?;
    writeln!(out, "GreenCoin Token: {token}")?;
    writeln!(out, "GreenDish Main Contract: {marketplace}")?;

    if !result.facts().is_empty() {
        writeln!(out)?;
        writeln!(out, "Recorded Facts:")?;
        writeln!(out, "---------------")?;
        for (name, value) in result.facts() {
            writeln!(out, "{name}: {value}")?;
        }
    }

    if !result.transactions().is_empty() {
        writeln!(out)?;
        writeln!(out, "Transactions:")?;
        writeln!(out, "-------------")?;
        for tx in result.transactions() {
            match tx.block_number {
                Some(block) => writeln!(out, "{}: {} (block {block})", tx.step, tx.tx_hash)?,
                None => writeln!(out, "{}: {}", tx.step, tx.tx_hash)?,
            }
        }
    }

    if !result.warnings().is_empty() {
        writeln!(out)?;
        writeln!(out, "Warnings:")?;
        writeln!(out, "---------")?;
        for warning in result.warnings() {
            writeln!(out, "! {warning}")?;
        }
    }

    writeln!(out)?;
    writeln!(out, "Next Steps:")?;
    writeln!(out, "-----------")?;
    writeln!(out, "1. Serve the public/ directory and open it in a browser")?;
    writeln!(out, "2. Connect a wallet to the network above")?;
    writeln!(out, "3. Verify the contracts on the block explorer (public networks only)")
}
