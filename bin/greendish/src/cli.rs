use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{CommandFactory, Parser, error::ErrorKind};
use greendish_deploy::{CONFIG_FILENAME, parse_address};
use tracing::level_filters::LevelFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "greendish")]
#[command(
    author,
    version,
    about = "Deploy the GreenDish contracts and publish their addresses",
    long_about = "Deploy the GreenCoin token and the GreenDish marketplace, wire them together \
and publish the resulting addresses to the manifests, the browser config module and the summary.\n\n\
Pass TOKEN_ADDRESS and MARKETPLACE_ADDRESS to skip deployment and only republish those addresses. \
With --resume, they name the contracts a failed run already deployed."
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "GREENDISH_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the configuration file, or a directory containing Greendish.toml.
    ///
    /// A missing file is fine: built-in defaults and GREENDISH_* environment
    /// variables are used instead.
    #[arg(long, alias = "conf", env = "GREENDISH_CONFIG", default_value = CONFIG_FILENAME)]
    pub config: PathBuf,

    /// The JSON-RPC endpoint of the target network. Overrides the configuration file.
    #[arg(long, alias = "rpc", env = "GREENDISH_RPC_URL")]
    pub rpc_url: Option<Url>,

    /// Hex private key used to sign transactions.
    ///
    /// Without it, transactions are sent from the node's first unlocked account.
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Etherscan API key. Enables the source verification check on public networks.
    #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
    pub etherscan_api_key: Option<String>,

    /// Reuse contracts and on-chain effects recorded in the existing manifest,
    /// or those named by TOKEN_ADDRESS and MARKETPLACE_ADDRESS.
    #[arg(long, conflicts_with = "inspect")]
    pub resume: bool,

    /// Report which steps are already satisfied on chain, without sending anything.
    #[arg(long)]
    pub inspect: bool,

    /// Write the resolved configuration to this path before running.
    #[arg(long)]
    pub save_config: Option<PathBuf>,

    /// Token contract address, to republish or to resume from.
    #[arg(
        value_name = "TOKEN_ADDRESS",
        value_parser = parse_address,
        conflicts_with = "inspect"
    )]
    pub token: Option<Address>,

    /// Marketplace contract address, to republish or to resume from.
    #[arg(value_name = "MARKETPLACE_ADDRESS", value_parser = parse_address)]
    pub marketplace: Option<Address>,
}

impl Cli {
    /// Parse the command line, exiting with a usage error on invalid input.
    pub fn parse_args() -> Self {
        let cli = Self::parse();
        if let Err(err) = cli.validate() {
            err.exit();
        }
        cli
    }

    /// Checks clap cannot express: the update mode needs both addresses, while
    /// resuming after a failure before the marketplace only has the token.
    pub fn validate(&self) -> Result<(), clap::Error> {
        if !self.resume && self.token.is_some() && self.marketplace.is_none() {
            return Err(Self::command().error(
                ErrorKind::MissingRequiredArgument,
                "MARKETPLACE_ADDRESS is required to update addresses; pass --resume to resume a failed run",
            ));
        }
        Ok(())
    }

    /// Both addresses, when running in address-update-only mode.
    pub fn update_addresses(&self) -> Option<(Address, Address)> {
        if self.resume {
            return None;
        }
        self.token.zip(self.marketplace)
    }

    /// Contracts named on the command line to resume from.
    pub fn resume_addresses(&self) -> Option<(Address, Option<Address>)> {
        if !self.resume {
            return None;
        }
        self.token.map(|token| (token, self.marketplace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let cli = Cli::try_parse_from(args)?;
        cli.validate()?;
        Ok(cli)
    }

    const TOKEN: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
    const MARKETPLACE: &str = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512";

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_update_mode_takes_two_addresses() {
        let cli = Cli::try_parse_from(["greendish", TOKEN, MARKETPLACE]).unwrap();
        assert_eq!(
            cli.update_addresses(),
            Some((TOKEN.parse().unwrap(), MARKETPLACE.parse().unwrap()))
        );

        let cli = Cli::try_parse_from(["greendish"]).unwrap();
        assert_eq!(cli.update_addresses(), None);
    }

    #[test]
    fn test_malformed_addresses_are_usage_errors() {
        for bad in [
            "0x5FbDB2315678afecb367f032d93F642f64180aa",
            "0x5FbDB2315678afecb367f032d93F642f64180aaZ",
            "5FbDB2315678afecb367f032d93F642f64180aa3",
        ] {
            let err = Cli::try_parse_from(["greendish", bad, MARKETPLACE])
                .err()
                .unwrap();
            assert_eq!(err.kind(), ErrorKind::ValueValidation, "{bad}");
            assert_eq!(err.exit_code(), 2);
        }
    }

    #[test]
    fn test_single_address_is_rejected() {
        let err = parse(&["greendish", TOKEN]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_resume_takes_reported_addresses() {
        let cli = parse(&["greendish", "--resume", TOKEN, MARKETPLACE]).unwrap();
        assert_eq!(cli.update_addresses(), None);
        assert_eq!(
            cli.resume_addresses(),
            Some((TOKEN.parse().unwrap(), Some(MARKETPLACE.parse().unwrap())))
        );

        let cli = parse(&["greendish", "--resume", TOKEN]).unwrap();
        assert_eq!(cli.resume_addresses(), Some((TOKEN.parse().unwrap(), None)));

        let cli = parse(&["greendish", "--resume"]).unwrap();
        assert_eq!(cli.resume_addresses(), None);
    }

    #[test]
    fn test_addresses_conflict_with_inspect() {
        assert!(parse(&["greendish", "--inspect", TOKEN, MARKETPLACE]).is_err());
    }
}
