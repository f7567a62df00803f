//! greendish-deploy - Deployment library for the GreenDish contracts.
//!
//! This crate deploys the GreenCoin token and the GreenDish marketplace in
//! dependency order, wires them together and publishes the resulting addresses
//! to every file the browser client reads.

pub mod chain;
pub use chain::{ChainClient, ContractArtifacts, PendingTx, RpcChainClient, RpcChainClientConfig, TxReceipt};

mod config;
pub use config::{
    AllocationStrategy, CONFIG_FILENAME, DEFAULT_RPC_URL, DeployConfig, ListingConfig,
    MarketplaceConfig, PublishConfig, TokenConfig,
};

mod deployer;
pub use deployer::{DeployError, Deployer};

pub mod error;
pub use error::{
    ArtifactError, ArtifactFailure, ChainError, ConfigError, DeploymentError, PublishError,
};

mod executor;
pub use executor::{ExecutionMode, Executor, RESTAURANT_NAME_LABEL, RunMetadata};

pub mod explorer;
pub use explorer::{ExplorerClient, VerificationStatus};

mod fs;

mod inspect;
pub use inspect::{InspectionReport, StepReport, StepStatus};

pub mod plan;
pub use plan::{DeploymentStep, Phase, Plan, StepAction, StepInput, build_plan};

pub mod publish;
pub use publish::{ArtifactKind, ArtifactTarget, ManifestRecord, PublishedArtifact, Publisher};

mod result;
pub use result::{DeploymentResult, StepTransaction};

mod update;
pub use update::{update_addresses, updated_result};

mod value;
pub use value::{Value, parse_address};
