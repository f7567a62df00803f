//! Block explorer source verification lookup.
//!
//! Purely informational: callers log the outcome and carry on.

use std::time::Duration;

use alloy_core::primitives::Address;
use serde::Deserialize;
use url::Url;

use crate::result::DeploymentResult;

/// Etherscan multichain API endpoint.
pub const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Chains the explorer lookup knows about: mainnet and Sepolia.
pub const SUPPORTED_CHAINS: &[u64] = &[1, 11_155_111];

pub fn is_supported_chain(chain_id: u64) -> bool {
    SUPPORTED_CHAINS.contains(&chain_id)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExplorerError {
    #[error("explorer request failed: {0}")]
    Http(String),

    #[error("explorer returned an error: {0}")]
    Api(String),

    #[error("chain {0} is not supported by the explorer")]
    UnsupportedChain(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    Verified { contract_name: String },
    Unverified,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    message: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SourceEntry {
    #[serde(default)]
    source_code: String,
    #[serde(default)]
    contract_name: String,
}

fn parse_source_response(response: ApiResponse) -> Result<VerificationStatus, ExplorerError> {
    if response.status != "1" {
        let detail = response
            .result
            .as_str()
            .map(str::to_string)
            .unwrap_or(response.message);
        return Err(ExplorerError::Api(detail));
    }

    let entries: Vec<SourceEntry> =
        serde_json::from_value(response.result).map_err(|e| ExplorerError::Api(e.to_string()))?;
    match entries.into_iter().next() {
        Some(entry) if !entry.source_code.is_empty() => Ok(VerificationStatus::Verified {
            contract_name: entry.contract_name,
        }),
        _ => Ok(VerificationStatus::Unverified),
    }
}

#[derive(Debug, Clone)]
pub struct ExplorerClient {
    http: reqwest::Client,
    api_url: Url,
    api_key: String,
}

impl ExplorerClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ExplorerError> {
        let api_url = Url::parse(ETHERSCAN_API_URL).map_err(|e| ExplorerError::Http(e.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ExplorerError::Http(e.to_string()))?;
        Ok(Self {
            http,
            api_url,
            api_key: api_key.into(),
        })
    }

    pub fn with_api_url(mut self, api_url: Url) -> Self {
        self.api_url = api_url;
        self
    }

    /// Whether the explorer has verified source for `address`.
    pub async fn source_status(
        &self,
        chain_id: u64,
        address: Address,
    ) -> Result<VerificationStatus, ExplorerError> {
        if !is_supported_chain(chain_id) {
            return Err(ExplorerError::UnsupportedChain(chain_id));
        }

        let response: ApiResponse = self
            .http
            .get(self.api_url.clone())
            .query(&[
                ("chainid", chain_id.to_string()),
                ("module", "contract".to_string()),
                ("action", "getsourcecode".to_string()),
                ("address", address.to_string()),
                ("apikey", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| ExplorerError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| ExplorerError::Http(e.to_string()))?
            .json()
            .await
            .map_err(|e| ExplorerError::Http(e.to_string()))?;

        parse_source_response(response)
    }

    /// Look up every deployed address and log the outcome. Never fails.
    pub async fn report(&self, result: &DeploymentResult) {
        let Some(chain_id) = result.network_id() else {
            tracing::info!("Unknown chain id, skipping explorer verification check");
            return;
        };
        if !is_supported_chain(chain_id) {
            tracing::info!(chain_id, "Explorer verification not available for this chain");
            return;
        }

        for (name, address) in result.addresses() {
            match self.source_status(chain_id, *address).await {
                Ok(VerificationStatus::Verified { contract_name }) => {
                    tracing::info!(contract = %name, %address, %contract_name, "Source verified on explorer");
                }
                Ok(VerificationStatus::Unverified) => {
                    tracing::info!(contract = %name, %address, "Source not verified on explorer yet");
                }
                Err(e) => {
                    tracing::warn!(contract = %name, %address, error = %e, "Explorer lookup failed");
                }
            }
        }
    }
}
