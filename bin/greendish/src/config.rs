//! Configuration layering: defaults, then the TOML file, then the environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use greendish_deploy::{CONFIG_FILENAME, DeployConfig};

use crate::cli::Cli;

/// Prefix of environment variables that override configuration values.
/// Nested keys use `__`, e.g. `GREENDISH_TOKEN__ECOSYSTEM_PERCENTAGE=25`.
const ENV_PREFIX: &str = "GREENDISH_";

fn config_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(CONFIG_FILENAME)
    } else {
        path.to_path_buf()
    }
}

pub fn figment(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(DeployConfig::default()))
        .merge(Toml::file(config_file(path)))
        .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["verbosity", "config"]))
}

/// Resolve the configuration for this invocation and validate it.
pub fn load(cli: &Cli) -> Result<DeployConfig> {
    let path = config_file(&cli.config);
    let mut config: DeployConfig = figment(&cli.config)
        .extract()
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    if let Some(rpc_url) = &cli.rpc_url {
        config.rpc_url = rpc_url.to_string();
    }

    config.validate()?;

    tracing::debug!(
        path = %path.display(),
        exists = path.exists(),
        network = %config.network_name,
        rpc_url = %config.rpc_url,
        "Configuration resolved"
    );

    Ok(config)
}
