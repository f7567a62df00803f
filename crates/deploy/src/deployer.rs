use std::collections::BTreeMap;

use alloy_core::primitives::Address;

use crate::{
    ChainClient, DeployConfig, DeploymentResult, ExecutionMode, Executor, InspectionReport,
    Publisher,
    error::{ConfigError, DeploymentError, PublishError},
    executor::Aborted,
    plan::{MARKETPLACE, Plan, TOKEN, build_plan},
};

/// Failure of a full deploy-and-publish run.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The run stopped. `confirmed` holds the contracts it had already deployed
    /// or reused, which a resumed run can pick up.
    #[error("{error}")]
    Deployment {
        #[source]
        error: DeploymentError,
        confirmed: BTreeMap<String, Address>,
    },

    /// Chain state is final; only the downstream files are out of date.
    #[error("deployment succeeded on chain but publishing failed: {error}")]
    Publish {
        result: Box<DeploymentResult>,
        error: PublishError,
    },
}

impl DeployError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Deployment { error, .. } => error.kind(),
            Self::Publish { error, .. } => error.kind(),
        }
    }

    /// Contracts already on chain when the run stopped, by logical name.
    pub fn confirmed(&self) -> Option<&BTreeMap<String, Address>> {
        match self {
            Self::Deployment { confirmed, .. } => Some(confirmed),
            Self::Publish { .. } => None,
        }
    }

    fn aborted(aborted: Aborted) -> Self {
        Self::Deployment {
            error: aborted.error,
            confirmed: aborted.confirmed,
        }
    }
}

/// Main deployer that runs the plan and publishes its result.
#[derive(Debug, Clone)]
pub struct Deployer {
    config: DeployConfig,
    plan: Plan,
    publisher: Publisher,
    resume: bool,
    /// Addresses to resume from instead of the recorded manifest.
    known: BTreeMap<String, Address>,
}

impl Deployer {
    /// Validate `config` and build the plan. Nothing touches the chain or the
    /// file system yet.
    pub fn new(config: DeployConfig) -> Result<Self, ConfigError> {
        let plan = build_plan(&config)?;
        let publisher = Publisher::from_config(&config);
        Ok(Self {
            config,
            plan,
            publisher,
            resume: false,
            known: BTreeMap::new(),
        })
    }

    /// Reuse chain state recorded in the existing manifest.
    pub fn resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Resume from contracts a failed run reported, rather than from the
    /// manifest. The marketplace is absent when the run stopped before it.
    pub fn resume_from(mut self, token: Address, marketplace: Option<Address>) -> Self {
        self.resume = true;
        self.known = BTreeMap::from([(TOKEN.to_string(), token)]);
        if let Some(marketplace) = marketplace {
            self.known.insert(MARKETPLACE.to_string(), marketplace);
        }
        self
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Executor seeded with the recorded addresses when resuming.
    fn executor(&self, resume: bool) -> Executor {
        let executor = Executor::from_config(&self.config);
        if !resume {
            return executor;
        }

        if !self.known.is_empty() {
            tracing::info!(addresses = ?self.known, "Resuming from the given addresses");
            return executor.mode(ExecutionMode::Resume {
                known: self.known.clone(),
            });
        }

        let known = match self.publisher.read_existing_manifest() {
            Some((path, record)) => {
                if record.config_hash.as_deref() != Some(self.config.config_hash().as_str()) {
                    tracing::warn!(
                        path = %path.display(),
                        "Recorded deployment was made with different settings"
                    );
                }
                tracing::info!(path = %path.display(), addresses = ?record.addresses(), "Loaded recorded addresses");
                record.addresses()
            }
            None => {
                tracing::info!("No readable manifest found, nothing to resume from");
                Default::default()
            }
        };
        executor.mode(ExecutionMode::Resume { known })
    }

    /// Run the plan, then publish the result to every artifact.
    pub async fn deploy<C: ChainClient>(&self, client: &C) -> Result<DeploymentResult, DeployError> {
        tracing::info!(
            network = %self.config.network_name,
            resume = self.resume,
            "Starting deployment process..."
        );

        let result = self
            .executor(self.resume)
            .run_tracked(&self.plan, client)
            .await
            .map_err(DeployError::aborted)?;

        if let Err(error) = self.publisher.publish(&result) {
            return Err(DeployError::Publish {
                result: Box::new(result),
                error,
            });
        }

        tracing::info!("✓ Deployment complete!");
        if let Some(address) = result.token_address() {
            tracing::info!("{} token:        {}", self.config.token.contract, address);
        }
        if let Some(address) = result.marketplace_address() {
            tracing::info!("{} marketplace:  {}", self.config.marketplace.contract, address);
        }
        for warning in result.warnings() {
            tracing::warn!("Verification warning: {}", warning);
        }

        Ok(result)
    }

    /// Report how far the plan has progressed, without submitting anything.
    pub async fn inspect<C: ChainClient>(
        &self,
        client: &C,
    ) -> Result<InspectionReport, DeploymentError> {
        self.executor(true).inspect(&self.plan, client).await
    }
}
