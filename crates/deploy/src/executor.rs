//! Deployment execution engine.
//!
//! Steps run strictly in plan order. Every mutating step is awaited until mined
//! before the next step starts. Nothing is ever resubmitted: a failure aborts the
//! run and the partial result is dropped.

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use alloy_core::primitives::{Address, U256};
use chrono::Utc;
use tracing::Instrument;

use crate::{
    chain::{ChainClient, PendingTx, TxReceipt},
    config::DeployConfig,
    error::{ConfigError, DeploymentError},
    plan::{Check, Derivation, DeploymentStep, Plan, Probe, StepAction, StepInput},
    result::{DeploymentResult, ResultBuilder, StepTransaction},
    value::Value,
};

/// Label under which the restaurant name is recorded.
pub const RESTAURANT_NAME_LABEL: &str = "restaurantName";

/// Whether earlier chain state may satisfy steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Submit every mutating step.
    #[default]
    Fresh,
    /// Skip steps whose effect is already visible on chain, given the addresses a
    /// previous run recorded. Skipping stops at the first step that is submitted.
    Resume { known: BTreeMap<String, Address> },
}

/// Metadata copied into the result, independent of chain state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunMetadata {
    pub network_name: Option<String>,
    /// When set, the node must report this chain id.
    pub expected_chain_id: Option<u64>,
    pub config_hash: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl RunMetadata {
    pub fn from_config(config: &DeployConfig) -> Self {
        Self {
            network_name: Some(config.network_name.clone()),
            expected_chain_id: config.chain_id,
            config_hash: Some(config.config_hash()),
            labels: BTreeMap::from([(
                RESTAURANT_NAME_LABEL.to_string(),
                config.listing.restaurant_name.clone(),
            )]),
        }
    }
}

/// Outputs of the steps executed so far, keyed by step name.
#[derive(Debug, Default)]
pub(crate) struct Outputs(HashMap<String, Value>);

impl Outputs {
    pub(crate) fn insert(&mut self, step: &str, value: Value) {
        self.0.insert(step.to_string(), value);
    }

    pub(crate) fn resolve(&self, step: &str, input: &StepInput) -> Result<Value, DeploymentError> {
        match input {
            StepInput::Const(value) => Ok(value.clone()),
            StepInput::Output(reference) => {
                self.0
                    .get(reference)
                    .cloned()
                    .ok_or_else(|| DeploymentError::UnresolvedInput {
                        step: step.to_string(),
                        reference: reference.clone(),
                    })
            }
        }
    }

    pub(crate) fn resolve_all(
        &self,
        step: &str,
        inputs: &[StepInput],
    ) -> Result<Vec<Value>, DeploymentError> {
        inputs.iter().map(|input| self.resolve(step, input)).collect()
    }

    pub(crate) fn resolve_address(
        &self,
        step: &str,
        input: &StepInput,
    ) -> Result<Address, DeploymentError> {
        let value = self.resolve(step, input)?;
        value
            .as_address()
            .ok_or_else(|| DeploymentError::InvalidInput {
                step: step.to_string(),
                expected: "an address",
                found: format!("{} {value}", value.type_name()),
            })
    }
}

/// Compute a derived value from earlier outputs.
pub(crate) fn derive(
    step: &str,
    derivation: &Derivation,
    outputs: &Outputs,
) -> Result<Value, DeploymentError> {
    match derivation {
        Derivation::Percentage { of, percent } => {
            let base = outputs.resolve(step, of)?;
            let base = base.as_uint().ok_or_else(|| DeploymentError::InvalidInput {
                step: step.to_string(),
                expected: "an unsigned integer",
                found: format!("{} {base}", base.type_name()),
            })?;
            let scaled = base.checked_mul(U256::from(*percent)).ok_or_else(|| {
                DeploymentError::InvalidInput {
                    step: step.to_string(),
                    expected: "a value small enough to scale by a percentage",
                    found: base.to_string(),
                }
            })?;
            Ok(Value::Uint(scaled / U256::from(100u64)))
        }
    }
}

/// Whether `actual` satisfies `check`.
pub(crate) fn check_passes(
    step: &str,
    check: &Check,
    actual: &Value,
    outputs: &Outputs,
) -> Result<bool, DeploymentError> {
    match check {
        Check::Equals(expected) => Ok(outputs.resolve(step, expected)? == *actual),
        Check::AtLeast(expected) => {
            let expected = outputs.resolve(step, expected)?;
            Ok(matches!(
                (actual.as_uint(), expected.as_uint()),
                (Some(actual), Some(expected)) if actual >= expected
            ))
        }
    }
}

/// Run a probe read and evaluate its check.
pub(crate) async fn probe_satisfied<C: ChainClient>(
    client: &C,
    step: &str,
    probe: &Probe,
    outputs: &Outputs,
) -> Result<bool, DeploymentError> {
    let target = outputs.resolve_address(step, &probe.target)?;
    let args = outputs.resolve_all(step, &probe.args)?;
    let actual = client
        .read(target, &probe.method, &args)
        .await
        .map_err(|e| DeploymentError::from_chain(step, e))?;
    check_passes(step, &probe.check, &actual, outputs)
}

/// Whether a contract lives at `address`.
pub(crate) async fn has_code<C: ChainClient>(
    client: &C,
    step: &str,
    address: Address,
) -> Result<bool, DeploymentError> {
    client
        .code_at(address)
        .await
        .map(|code| !code.is_empty())
        .map_err(|e| DeploymentError::from_chain(step, e))
}

/// A run stopped by a fatal error.
#[derive(Debug)]
pub(crate) struct Aborted {
    pub(crate) error: DeploymentError,
    /// Contracts deployed or reused before the failure, by logical name.
    pub(crate) confirmed: BTreeMap<String, Address>,
}

impl Aborted {
    fn before_start(error: DeploymentError) -> Self {
        Self {
            error,
            confirmed: BTreeMap::new(),
        }
    }
}

/// State of a run in progress.
struct Run {
    outputs: Outputs,
    result: ResultBuilder,
    /// Still allowed to skip steps already visible on chain.
    resuming: bool,
}

/// Executes a [`Plan`] against a [`ChainClient`].
#[derive(Debug, Clone)]
pub struct Executor {
    confirmation_timeout: Duration,
    mode: ExecutionMode,
    metadata: RunMetadata,
}

impl Executor {
    pub fn new(confirmation_timeout: Duration) -> Self {
        Self {
            confirmation_timeout,
            mode: ExecutionMode::Fresh,
            metadata: RunMetadata::default(),
        }
    }

    /// Executor configured from a deployment configuration.
    pub fn from_config(config: &DeployConfig) -> Self {
        Self::new(config.confirmation_timeout()).metadata(RunMetadata::from_config(config))
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn metadata(mut self, metadata: RunMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Check the node's chain id against the expected one.
    pub(crate) async fn connect<C: ChainClient>(&self, client: &C) -> Result<u64, DeploymentError> {
        let chain_id = client
            .chain_id()
            .await
            .map_err(|e| DeploymentError::from_chain("connect", e))?;

        if let Some(expected) = self.metadata.expected_chain_id {
            if expected != chain_id {
                return Err(ConfigError::Invalid {
                    field: "chain_id",
                    reason: format!("node reports chain id {chain_id}, expected {expected}"),
                }
                .into());
            }
        }

        Ok(chain_id)
    }

    pub(crate) fn known_addresses(&self) -> Option<&BTreeMap<String, Address>> {
        match &self.mode {
            ExecutionMode::Fresh => None,
            ExecutionMode::Resume { known } => Some(known),
        }
    }

    /// Run every step of `plan`.
    ///
    /// Returns the completed result, or the first fatal error. Verification reads
    /// that fail or disagree are recorded as warnings on the result instead.
    pub async fn run<C: ChainClient>(
        &self,
        plan: &Plan,
        client: &C,
    ) -> Result<DeploymentResult, DeploymentError> {
        self.run_tracked(plan, client).await.map_err(|aborted| aborted.error)
    }

    /// Like [`Executor::run`], but a failure also reports the contracts the run
    /// had already confirmed.
    pub(crate) async fn run_tracked<C: ChainClient>(
        &self,
        plan: &Plan,
        client: &C,
    ) -> Result<DeploymentResult, Aborted> {
        let chain_id = self.connect(client).await.map_err(Aborted::before_start)?;

        tracing::info!(
            chain_id,
            steps = plan.steps().len(),
            mode = if self.known_addresses().is_some() { "resume" } else { "fresh" },
            "Starting deployment run..."
        );

        let mut result = ResultBuilder::new(Some(chain_id), self.metadata.network_name.clone());
        result.config_hash(self.metadata.config_hash.clone());
        for (name, value) in &self.metadata.labels {
            result.label(name, value);
        }

        let mut run = Run {
            outputs: Outputs::default(),
            result,
            resuming: self.known_addresses().is_some(),
        };

        for step in plan.steps() {
            let span = tracing::info_span!("step", step = %step.name, phase = %step.phase);
            if let Err(error) = self.execute_step(step, client, &mut run).instrument(span).await {
                tracing::error!(step = %step.name, kind = error.kind(), error = %error, "Step failed, aborting run");
                return Err(Aborted {
                    error,
                    confirmed: run.result.addresses().clone(),
                });
            }
        }

        let result = run.result.finish(Utc::now());

        tracing::info!(
            addresses = ?result.addresses(),
            warnings = result.warnings().len(),
            "Deployment run complete"
        );

        Ok(result)
    }

    async fn execute_step<C: ChainClient>(
        &self,
        step: &DeploymentStep,
        client: &C,
        run: &mut Run,
    ) -> Result<(), DeploymentError> {
        let name = step.name.as_str();

        match &step.action {
            StepAction::DeployContract {
                contract,
                logical_name,
                args,
            } => {
                if let Some(address) = self.already_deployed(client, name, logical_name, run).await? {
                    tracing::info!(%address, "Contract already deployed, skipping");
                    run.outputs.insert(name, Value::Address(address));
                    run.result.address(logical_name, address);
                    return Ok(());
                }
                run.resuming = false;

                let args = run.outputs.resolve_all(name, args)?;
                tracing::info!(contract, "Deploying contract...");
                let pending = client
                    .deploy_contract(contract, &args)
                    .await
                    .map_err(|e| DeploymentError::from_chain(name, e))?;
                let receipt = self.confirm(name, client, &pending, run).await?;

                let address =
                    receipt
                        .contract_address
                        .ok_or_else(|| DeploymentError::ChainTransport {
                            step: name.to_string(),
                            reason: format!(
                                "receipt for {} carries no contract address",
                                receipt.tx_hash
                            ),
                        })?;

                tracing::info!(contract, %address, "Contract deployed");
                run.outputs.insert(name, Value::Address(address));
                run.result.address(logical_name, address);
            }

            StepAction::InvokeMethod {
                target,
                method,
                args,
                value,
                satisfied_when,
            } => {
                if run.resuming {
                    if let Some(probe) = satisfied_when {
                        if probe_satisfied(client, name, probe, &run.outputs).await? {
                            tracing::info!(method, "Effect already visible on chain, skipping");
                            return Ok(());
                        }
                    }
                }
                run.resuming = false;

                let address = run.outputs.resolve_address(name, target)?;
                let args = run.outputs.resolve_all(name, args)?;
                tracing::info!(%address, method, "Invoking method...");
                let pending = client
                    .call(address, method, &args, *value)
                    .await
                    .map_err(|e| DeploymentError::from_chain(name, e))?;
                self.confirm(name, client, &pending, run).await?;
            }

            StepAction::ReadValue {
                target,
                method,
                args,
                expect,
                record_as,
            } => {
                let address = run.outputs.resolve_address(name, target)?;
                let args = run.outputs.resolve_all(name, args)?;
                let value = match client.read(address, method, &args).await {
                    Ok(value) => value,
                    // Verification reads feed no later step.
                    Err(e) if expect.is_some() => {
                        tracing::warn!(step = name, error = %e, "Read-back verification failed");
                        run.result
                            .warning(format!("{name}: {method} could not be read back: {e}"));
                        return Ok(());
                    }
                    Err(e) => return Err(DeploymentError::from_chain(name, e)),
                };

                tracing::info!(method, %value, "Read back value");

                if let Some(check) = expect {
                    if !check_passes(name, check, &value, &run.outputs)? {
                        let warning = format!(
                            "{name}: {method} returned {value}, expected {}",
                            describe_check(name, check, &run.outputs)
                        );
                        tracing::warn!(step = name, %value, "Read-back verification mismatch");
                        run.result.warning(warning);
                    }
                }

                if let Some(fact) = record_as {
                    run.result.fact(fact, value.clone());
                }
                run.outputs.insert(name, value);
            }

            StepAction::WriteDerivedValue {
                derivation,
                record_as,
            } => {
                let value = derive(name, derivation, &run.outputs)?;
                tracing::info!(fact = %record_as, %value, "Derived value");
                run.result.fact(record_as, value.clone());
                run.outputs.insert(name, value);
            }
        }

        Ok(())
    }

    /// Address recorded by a previous run that still has code, when resuming.
    async fn already_deployed<C: ChainClient>(
        &self,
        client: &C,
        step: &str,
        logical_name: &str,
        run: &Run,
    ) -> Result<Option<Address>, DeploymentError> {
        if !run.resuming {
            return Ok(None);
        }
        let Some(address) = self
            .known_addresses()
            .and_then(|known| known.get(logical_name).copied())
        else {
            return Ok(None);
        };

        if has_code(client, step, address).await? {
            Ok(Some(address))
        } else {
            tracing::warn!(%address, "Recorded address has no code, deploying again");
            Ok(None)
        }
    }

    /// Wait for `pending` to be mined, bounded by the confirmation timeout.
    async fn confirm<C: ChainClient>(
        &self,
        step: &str,
        client: &C,
        pending: &PendingTx,
        run: &mut Run,
    ) -> Result<TxReceipt, DeploymentError> {
        tracing::debug!(tx_hash = %pending.tx_hash, "Waiting for confirmation...");

        let receipt = tokio::time::timeout(self.confirmation_timeout, client.wait_confirmed(pending))
            .await
            .map_err(|_| DeploymentError::ConfirmationTimeout {
                step: step.to_string(),
                tx_hash: pending.tx_hash,
                waited: self.confirmation_timeout,
            })?
            .map_err(|e| DeploymentError::from_chain(step, e))?;

        if !receipt.success {
            return Err(DeploymentError::ChainRevert {
                step: step.to_string(),
                reason: None,
            });
        }

        tracing::info!(tx_hash = %receipt.tx_hash, block = ?receipt.block_number, "Transaction confirmed");
        run.result.transaction(StepTransaction {
            step: step.to_string(),
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
        });

        Ok(receipt)
    }
}

fn describe_check(step: &str, check: &Check, outputs: &Outputs) -> String {
    let (prefix, input) = match check {
        Check::Equals(input) => ("", input),
        Check::AtLeast(input) => ("at least ", input),
    };
    match outputs.resolve(step, input) {
        Ok(value) => format!("{prefix}{value}"),
        Err(_) => format!("{prefix}{input:?}"),
    }
}
