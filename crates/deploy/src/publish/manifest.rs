//! JSON deployment manifest.
//!
//! The manifest is fetched by the browser config loader. Besides the canonical
//! `tokenAddress` / `marketplaceAddress` keys it carries `greenCoinAddress` /
//! `greenDishAddress`, which is what the shipped loader reads.

use std::{collections::BTreeMap, path::Path};

use alloy_core::primitives::Address;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::ArtifactError,
    plan::{MARKETPLACE, TOKEN},
    result::DeploymentResult,
    value::Value,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestDocument<'a> {
    token_address: Address,
    marketplace_address: Address,
    green_coin_address: Address,
    green_dish_address: Address,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    network_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    network_name: Option<&'a str>,
    #[serde(flatten)]
    labels: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_hash: Option<&'a str>,
    tool_version: &'static str,
    facts: BTreeMap<&'a str, String>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    warnings: &'a [String],
}

/// Render `result` as the manifest JSON (pretty printed, trailing newline).
pub fn render(result: &DeploymentResult) -> Result<String, ArtifactError> {
    let require = |name: &str| {
        result.address(name).ok_or_else(|| ArtifactError::MissingAddress {
            name: name.to_string(),
        })
    };
    let token = require(TOKEN)?;
    let marketplace = require(MARKETPLACE)?;

    let document = ManifestDocument {
        token_address: token,
        marketplace_address: marketplace,
        green_coin_address: token,
        green_dish_address: marketplace,
        timestamp: format_timestamp(result.timestamp()),
        network_id: result.network_id().map(|id| id.to_string()),
        network_name: result.network_name(),
        labels: result.labels(),
        config_hash: result.config_hash(),
        tool_version: env!("CARGO_PKG_VERSION"),
        facts: result
            .facts()
            .iter()
            .map(|(name, value)| (name.as_str(), value.to_string()))
            .collect(),
        warnings: result.warnings(),
    };

    let mut json = serde_json::to_string_pretty(&document)?;
    json.push('\n');
    Ok(json)
}

pub(crate) fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Loose view of any manifest variant found on disk.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestRecordRaw {
    token_address: Option<String>,
    marketplace_address: Option<String>,
    green_coin_address: Option<String>,
    green_dish_address: Option<String>,
    /// Legacy single-contract schema: the marketplace address.
    contract_address: Option<String>,
    timestamp: Option<String>,
    deployment_time: Option<String>,
    network_id: Option<serde_json::Value>,
    network_name: Option<String>,
    restaurant_name: Option<String>,
    config_hash: Option<String>,
    #[serde(default)]
    facts: BTreeMap<String, serde_json::Value>,
}

/// What an existing manifest says about a past deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestRecord {
    pub token: Option<Address>,
    pub marketplace: Option<Address>,
    pub timestamp: Option<DateTime<Utc>>,
    pub network_id: Option<u64>,
    pub network_name: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub config_hash: Option<String>,
    /// Facts as recorded; integers come back as strings.
    pub facts: BTreeMap<String, Value>,
}

impl ManifestRecord {
    /// Parse any of the known manifest schemas.
    ///
    /// Values present in the file win; address fields that do not parse are
    /// ignored rather than failing the whole file.
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        let raw: ManifestRecordRaw = serde_json::from_str(content)?;
        let address = |field: &Option<String>| field.as_deref().and_then(|s| s.parse().ok());

        let token = address(&raw.token_address).or_else(|| address(&raw.green_coin_address));
        let marketplace = address(&raw.marketplace_address)
            .or_else(|| address(&raw.green_dish_address))
            .or_else(|| address(&raw.contract_address));

        let timestamp = raw
            .timestamp
            .as_deref()
            .or(raw.deployment_time.as_deref())
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc));

        let network_id = raw.network_id.as_ref().and_then(|id| match id {
            serde_json::Value::String(s) => s.parse().ok(),
            serde_json::Value::Number(n) => n.as_u64(),
            _ => None,
        });

        let mut labels = BTreeMap::new();
        if let Some(name) = raw.restaurant_name {
            labels.insert(crate::executor::RESTAURANT_NAME_LABEL.to_string(), name);
        }

        let facts = raw
            .facts
            .into_iter()
            .filter_map(|(name, value)| {
                let value = match value {
                    serde_json::Value::String(s) => parse_fact(&s),
                    serde_json::Value::Bool(b) => Value::Bool(b),
                    serde_json::Value::Number(n) => Value::String(n.to_string()),
                    _ => return None,
                };
                Some((name, value))
            })
            .collect();

        Ok(Self {
            token,
            marketplace,
            timestamp,
            network_id,
            network_name: raw.network_name,
            labels,
            config_hash: raw.config_hash,
            facts,
        })
    }

    /// Read and parse the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content)?)
    }

    /// Recorded addresses keyed by logical contract name.
    pub fn addresses(&self) -> BTreeMap<String, Address> {
        let mut addresses = BTreeMap::new();
        if let Some(token) = self.token {
            addresses.insert(TOKEN.to_string(), token);
        }
        if let Some(marketplace) = self.marketplace {
            addresses.insert(MARKETPLACE.to_string(), marketplace);
        }
        addresses
    }
}

/// Recover the typed value of a fact rendered with [`Value`]'s `Display`.
fn parse_fact(s: &str) -> Value {
    if let Ok(address) = crate::value::parse_address(s) {
        return Value::Address(address);
    }
    if let Ok(value) = s.parse::<u128>() {
        return Value::Uint(alloy_core::primitives::U256::from(value));
    }
    if let Ok(value) = alloy_core::primitives::U256::from_str_radix(s, 10) {
        return Value::Uint(value);
    }
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN_ADDR: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
    const DISH_ADDR: &str = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512";

    #[test]
    fn test_parse_current_schema() {
        let content = format!(
            r#"{{
  "tokenAddress": "{TOKEN_ADDR}",
  "marketplaceAddress": "{DISH_ADDR}",
  "timestamp": "2024-05-01T10:00:00.000Z",
  "networkId": "31337",
  "networkName": "localhost",
  "restaurantName": "Green Eatery",
  "facts": {{ "totalSupply": "1000000", "tokenInitialized": "true" }}
}}"#
        );
        let record = ManifestRecord::parse(&content).unwrap();
        assert_eq!(record.token, Some(TOKEN_ADDR.parse().unwrap()));
        assert_eq!(record.marketplace, Some(DISH_ADDR.parse().unwrap()));
        assert_eq!(record.network_id, Some(31337));
        assert_eq!(record.labels.get("restaurantName").unwrap(), "Green Eatery");
        assert_eq!(record.facts.get("totalSupply"), Some(&Value::from(1_000_000u64)));
        assert_eq!(record.facts.get("tokenInitialized"), Some(&Value::Bool(true)));
        assert!(record.timestamp.is_some());
    }

    #[test]
    fn test_parse_browser_schema() {
        let content = format!(
            r#"{{"greenCoinAddress": "{TOKEN_ADDR}", "greenDishAddress": "{DISH_ADDR}", "timestamp": "2024-05-01T10:00:00.000Z", "restaurantName": "Green Eatery"}}"#
        );
        let record = ManifestRecord::parse(&content).unwrap();
        assert_eq!(record.token, Some(TOKEN_ADDR.parse().unwrap()));
        assert_eq!(record.marketplace, Some(DISH_ADDR.parse().unwrap()));
        assert_eq!(record.network_id, None);
    }

    #[test]
    fn test_parse_legacy_single_contract_schema() {
        let content = format!(
            r#"{{"contractAddress": "{DISH_ADDR}", "tokenAddress": "{TOKEN_ADDR}", "timestamp": "2024-05-01T10:00:00.000Z"}}"#
        );
        let record = ManifestRecord::parse(&content).unwrap();
        assert_eq!(record.token, Some(TOKEN_ADDR.parse().unwrap()));
        assert_eq!(record.marketplace, Some(DISH_ADDR.parse().unwrap()));
        assert_eq!(record.addresses().len(), 2);
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(ManifestRecord::parse("not json").is_err());
    }
}
