//! Deployment configuration.
//!
//! [`DeployConfig`] carries every static argument the plan needs (contract names,
//! allocation percentage, the initial catalog listing) plus where the results get
//! published. It is serialized to/from TOML and validated before any chain
//! interaction.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::{U256, utils::parse_ether};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ConfigError;

/// The default name for the configuration file.
pub const CONFIG_FILENAME: &str = "Greendish.toml";

/// Default JSON-RPC endpoint (local hardhat node).
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8546";

/// How the reward pool gets its share of the token supply.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AllocationStrategy {
    /// Plain ERC-20 `transfer(marketplace, totalSupply * pct / 100)`.
    #[default]
    Transfer,
    /// The token's own `allocateToRewardPool(address)`, which moves its built-in
    /// ecosystem share. The configured percentage is then only used to verify the
    /// resulting balance.
    RewardPoolMethod,
}

/// The fungible token contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Hardhat artifact name.
    pub contract: String,
    /// Label of the address assignment in the generated config module.
    pub label: String,
    /// Share of the total supply moved to the marketplace reward pool.
    pub ecosystem_percentage: u8,
    pub allocation: AllocationStrategy,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            contract: "GreenCoin".to_string(),
            label: "GreenCoin".to_string(),
            ecosystem_percentage: 30,
            allocation: AllocationStrategy::default(),
        }
    }
}

/// The dish marketplace contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    pub contract: String,
    pub label: String,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            contract: "GreenDish".to_string(),
            label: "GreenDish".to_string(),
        }
    }
}

/// The single catalog entry seeded after deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    pub restaurant_name: String,
    pub dish_name: String,
    /// Price in ether, as a decimal string (e.g. "0.01").
    pub price_eth: String,
    pub inventory: u64,
    /// Carbon credit score, 0 to 100.
    pub carbon_credits: u64,
    pub main_component: String,
    pub supply_source: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            restaurant_name: "Green Eatery".to_string(),
            dish_name: "Organic Salad".to_string(),
            price_eth: "0.01".to_string(),
            inventory: 100,
            carbon_credits: 25,
            main_component: "Leafy Greens".to_string(),
            supply_source: "Local Farm".to_string(),
        }
    }
}

impl ListingConfig {
    /// The listing price in wei.
    pub fn price_wei(&self) -> Result<U256, ConfigError> {
        if self.price_eth.trim().starts_with('-') {
            return Err(ConfigError::OutOfRange {
                field: "listing.price_eth",
                value: self.price_eth.clone(),
                expected: "a non-negative amount of ether",
            });
        }
        parse_ether(self.price_eth.trim()).map_err(|e| ConfigError::Invalid {
            field: "listing.price_eth",
            reason: e.to_string(),
        })
    }
}

/// Files that receive the deployment result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// JSON manifests, all rendered identically.
    pub manifests: Vec<PathBuf>,
    /// Existing browser config module whose address literals get patched.
    pub config_module: Option<PathBuf>,
    pub summary: Option<PathBuf>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            manifests: vec![
                PathBuf::from("public/deployments.json"),
                PathBuf::from("deployment-info.json"),
            ],
            config_module: Some(PathBuf::from("public/js/contract-config.js")),
            summary: Some(PathBuf::from("deployment-summary.txt")),
        }
    }
}

/// Full configuration of a deployment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Human readable network name recorded in the manifest.
    pub network_name: String,
    /// Chain id the run must target. Checked against the node when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    pub rpc_url: String,
    /// Hardhat artifacts directory holding compiled contracts.
    pub artifacts_dir: PathBuf,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,

    pub token: TokenConfig,
    pub marketplace: MarketplaceConfig,
    pub listing: ListingConfig,
    pub publish: PublishConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            network_name: "localhost".to_string(),
            chain_id: None,
            rpc_url: DEFAULT_RPC_URL.to_string(),
            artifacts_dir: PathBuf::from("public/artifacts"),
            confirmation_timeout_secs: 120,
            poll_interval_ms: 500,
            token: TokenConfig::default(),
            marketplace: MarketplaceConfig::default(),
            listing: ListingConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing { field });
    }
    Ok(())
}

fn require_percentage(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value > 100 {
        return Err(ConfigError::OutOfRange {
            field,
            value: value.to_string(),
            expected: "a value in [0, 100]",
        });
    }
    Ok(())
}

impl DeployConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check types and ranges of every static argument.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("network_name", &self.network_name)?;
        require_non_empty("rpc_url", &self.rpc_url)?;
        url::Url::parse(&self.rpc_url).map_err(|e| ConfigError::Invalid {
            field: "rpc_url",
            reason: e.to_string(),
        })?;

        require_non_empty("token.contract", &self.token.contract)?;
        require_non_empty("token.label", &self.token.label)?;
        require_percentage(
            "token.ecosystem_percentage",
            u64::from(self.token.ecosystem_percentage),
        )?;
        require_non_empty("marketplace.contract", &self.marketplace.contract)?;
        require_non_empty("marketplace.label", &self.marketplace.label)?;
        if self.token.label == self.marketplace.label {
            return Err(ConfigError::Invalid {
                field: "marketplace.label",
                reason: format!("duplicates token label `{}`", self.token.label),
            });
        }

        let listing = &self.listing;
        require_non_empty("listing.restaurant_name", &listing.restaurant_name)?;
        require_non_empty("listing.dish_name", &listing.dish_name)?;
        require_non_empty("listing.main_component", &listing.main_component)?;
        require_non_empty("listing.supply_source", &listing.supply_source)?;
        listing.price_wei()?;
        if listing.inventory == 0 {
            return Err(ConfigError::OutOfRange {
                field: "listing.inventory",
                value: "0".to_string(),
                expected: "at least 1",
            });
        }
        require_percentage("listing.carbon_credits", listing.carbon_credits)?;

        if self.confirmation_timeout_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "confirmation_timeout_secs",
                value: "0".to_string(),
                expected: "at least 1",
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "poll_interval_ms",
                value: "0".to_string(),
                expected: "at least 1",
            });
        }

        let publish = &self.publish;
        if publish.manifests.is_empty()
            && publish.config_module.is_none()
            && publish.summary.is_none()
        {
            return Err(ConfigError::Missing {
                field: "publish (at least one target)",
            });
        }
        let mut seen = HashSet::new();
        let targets = publish
            .manifests
            .iter()
            .chain(publish.config_module.iter())
            .chain(publish.summary.iter());
        for path in targets {
            if !seen.insert(path) {
                return Err(ConfigError::Invalid {
                    field: "publish",
                    reason: format!("{} is listed more than once", path.display()),
                });
            }
        }

        Ok(())
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Load(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content).map_err(|e| {
            ConfigError::Load(format!("failed to write config to {}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from [`CONFIG_FILENAME`] inside
    /// a directory.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Load(format!(
                "configuration file or directory not found: {}",
                path.display()
            )));
        }

        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            ConfigError::Load(format!(
                "failed to read config from {}: {e}",
                config_path.display()
            ))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::Load(format!("failed to parse config as TOML: {e}")))?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Hash of the settings that end up on chain.
    ///
    /// Runtime-only settings (RPC URL, timeouts, publish targets) are excluded so
    /// that changing them does not make an existing deployment look stale.
    pub fn config_hash(&self) -> String {
        #[derive(Serialize)]
        struct OnChainSettings<'a> {
            token_contract: &'a str,
            marketplace_contract: &'a str,
            ecosystem_percentage: u8,
            allocation: AllocationStrategy,
            listing: &'a ListingConfig,
        }

        let settings = OnChainSettings {
            token_contract: &self.token.contract,
            marketplace_contract: &self.marketplace.contract,
            ecosystem_percentage: self.token.ecosystem_percentage,
            allocation: self.token.allocation,
            listing: &self.listing,
        };

        // Plain structs of strings and integers always serialize.
        let json = serde_json::to_string(&settings).unwrap_or_default();
        hex::encode(Sha256::digest(json.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = DeployConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.listing.price_wei().unwrap(),
            U256::from(10_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_percentage_out_of_range() {
        let mut config = DeployConfig::default();
        config.token.ecosystem_percentage = 101;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "token.ecosystem_percentage",
                ..
            })
        ));

        let mut config = DeployConfig::default();
        config.listing.carbon_credits = 250;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "listing.carbon_credits",
                ..
            })
        ));
    }

    #[test]
    fn test_price_must_be_non_negative_number() {
        let mut config = DeployConfig::default();
        config.listing.price_eth = "-0.01".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "listing.price_eth",
                ..
            })
        ));

        config.listing.price_eth = "cheap".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "listing.price_eth",
                ..
            })
        ));

        config.listing.price_eth = "0".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_names_and_duplicate_labels() {
        let mut config = DeployConfig::default();
        config.listing.dish_name = "  ".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::Missing {
                field: "listing.dish_name"
            })
        );

        let mut config = DeployConfig::default();
        config.marketplace.label = "GreenCoin".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_publish_targets_rejected() {
        let mut config = DeployConfig::default();
        config.publish.summary = Some(PathBuf::from("deployment-info.json"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "publish", .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new("greendish-test").expect("Failed to create temp dir");
        let mut config = DeployConfig::default();
        config.chain_id = Some(31337);
        config.token.allocation = AllocationStrategy::RewardPoolMethod;

        let path = temp_dir.path().join(CONFIG_FILENAME);
        config.save_to_file(&path).expect("Failed to save config");

        let from_file = DeployConfig::load_from_file(&path).expect("Failed to load config");
        let from_dir = DeployConfig::load_from_file(temp_dir.path()).expect("Failed to load dir");
        assert_eq!(from_file, config);
        assert_eq!(from_dir, config);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new("greendish-test").expect("Failed to create temp dir");
        let result = DeployConfig::load_from_file(&temp_dir.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_config_hash_tracks_on_chain_settings_only() {
        let config = DeployConfig::default();
        let hash = config.config_hash();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, config.config_hash());

        let mut runtime_change = config.clone();
        runtime_change.rpc_url = "http://localhost:8545".to_string();
        runtime_change.confirmation_timeout_secs = 5;
        assert_eq!(runtime_change.config_hash(), hash);

        let mut listing_change = config.clone();
        listing_change.listing.inventory = 50;
        assert_ne!(listing_change.config_hash(), hash);

        let mut pct_change = config;
        pct_change.token.ecosystem_percentage = 20;
        assert_ne!(pct_change.config_hash(), hash);
    }
}
