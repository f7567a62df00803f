//! Address-update-only mode: republish known addresses without touching the chain.

use alloy_core::primitives::Address;
use chrono::Utc;

use crate::{
    error::PublishError,
    plan::{MARKETPLACE, TOKEN},
    publish::{ManifestRecord, Publisher},
    result::{DeploymentResult, ResultBuilder},
};

/// Build a result carrying `token` and `marketplace`, keeping everything else
/// `prior` recorded. Only the timestamp is fresh.
pub fn updated_result(
    prior: Option<&ManifestRecord>,
    token: Address,
    marketplace: Address,
) -> DeploymentResult {
    let mut builder = match prior {
        Some(record) => {
            let mut builder = ResultBuilder::new(record.network_id, record.network_name.clone());
            builder
                .facts(record.facts.clone())
                .config_hash(record.config_hash.clone());
            for (name, value) in &record.labels {
                builder.label(name, value);
            }
            builder
        }
        None => ResultBuilder::new(None, None),
    };

    builder.address(TOKEN, token).address(MARKETPLACE, marketplace);
    builder.finish(Utc::now())
}

/// Republish every artifact with the given addresses.
pub fn update_addresses(
    publisher: &Publisher,
    token: Address,
    marketplace: Address,
) -> Result<DeploymentResult, PublishError> {
    let prior = publisher.read_existing_manifest();
    match &prior {
        Some((path, record)) => tracing::info!(
            path = %path.display(),
            previous_token = ?record.token,
            previous_marketplace = ?record.marketplace,
            "Updating addresses recorded in existing manifest"
        ),
        None => tracing::info!("No readable manifest found, writing fresh artifacts"),
    }

    let result = updated_result(prior.as_ref().map(|(_, record)| record), token, marketplace);
    publisher.publish(&result)?;

    tracing::info!(%token, %marketplace, "Contract addresses updated");
    Ok(result)
}
