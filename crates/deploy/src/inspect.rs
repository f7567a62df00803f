//! Read-only view of how far a plan has progressed on chain.

use std::fmt;

use comfy_table::{Table, presets::UTF8_FULL};

use crate::{
    chain::ChainClient,
    error::DeploymentError,
    executor::{Executor, Outputs, check_passes, derive, has_code, probe_satisfied},
    plan::{DeploymentStep, Phase, Plan, StepAction},
    value::Value,
};

/// Where a single step stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// Its effect is already visible on chain.
    Satisfied { detail: String },
    /// Would be submitted by a run.
    Pending,
    /// Depends on a step that has not happened yet.
    Blocked { waiting_on: String },
    /// A read or derived value, and whether it meets its expectation.
    Value {
        value: Value,
        expectation_met: Option<bool>,
    },
    /// The chain could not answer.
    Failed { error: String },
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Satisfied { detail } => write!(f, "satisfied ({detail})"),
            Self::Pending => write!(f, "pending"),
            Self::Blocked { waiting_on } => write!(f, "blocked on {waiting_on}"),
            Self::Value {
                value,
                expectation_met: Some(false),
            } => write!(f, "{value} (mismatch)"),
            Self::Value { value, .. } => write!(f, "{value}"),
            Self::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: String,
    pub phase: Phase,
    pub kind: &'static str,
    pub status: StepStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionReport {
    pub chain_id: u64,
    pub steps: Vec<StepReport>,
}

impl InspectionReport {
    pub fn status(&self, step: &str) -> Option<&StepStatus> {
        self.steps.iter().find(|r| r.step == step).map(|r| &r.status)
    }

    /// True when no mutating step is left to submit.
    pub fn is_complete(&self) -> bool {
        self.steps
            .iter()
            .all(|r| !matches!(r.status, StepStatus::Pending | StepStatus::Blocked { .. }))
    }

    pub fn render_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(vec!["Phase", "Step", "Kind", "Status"]);
        for report in &self.steps {
            table.add_row(vec![
                report.phase.to_string(),
                report.step.clone(),
                report.kind.to_string(),
                report.status.to_string(),
            ]);
        }
        table.to_string()
    }
}

impl Executor {
    /// Evaluate every step against current chain state without submitting
    /// anything. Deploy steps use the addresses the executor was resumed with.
    pub async fn inspect<C: ChainClient>(
        &self,
        plan: &Plan,
        client: &C,
    ) -> Result<InspectionReport, DeploymentError> {
        let chain_id = self.connect(client).await?;
        let mut outputs = Outputs::default();
        let mut steps = Vec::with_capacity(plan.steps().len());

        for step in plan.steps() {
            let status = match self.inspect_step(step, client, &mut outputs).await {
                Ok(status) => status,
                Err(DeploymentError::UnresolvedInput { reference, .. }) => StepStatus::Blocked {
                    waiting_on: reference,
                },
                Err(e) => StepStatus::Failed {
                    error: e.to_string(),
                },
            };
            tracing::debug!(step = %step.name, %status, "Inspected step");
            steps.push(StepReport {
                step: step.name.clone(),
                phase: step.phase,
                kind: step.action.kind(),
                status,
            });
        }

        Ok(InspectionReport { chain_id, steps })
    }

    async fn inspect_step<C: ChainClient>(
        &self,
        step: &DeploymentStep,
        client: &C,
        outputs: &mut Outputs,
    ) -> Result<StepStatus, DeploymentError> {
        let name = step.name.as_str();

        match &step.action {
            StepAction::DeployContract { logical_name, .. } => {
                let Some(address) = self
                    .known_addresses()
                    .and_then(|known| known.get(logical_name).copied())
                else {
                    return Ok(StepStatus::Pending);
                };
                if !has_code(client, name, address).await? {
                    return Ok(StepStatus::Pending);
                }
                outputs.insert(name, Value::Address(address));
                Ok(StepStatus::Satisfied {
                    detail: address.to_string(),
                })
            }
            StepAction::InvokeMethod {
                target,
                args,
                satisfied_when,
                ..
            } => {
                outputs.resolve_address(name, target)?;
                outputs.resolve_all(name, args)?;
                match satisfied_when {
                    Some(probe) if probe_satisfied(client, name, probe, outputs).await? => {
                        Ok(StepStatus::Satisfied {
                            detail: format!("{} check passed", probe.method),
                        })
                    }
                    _ => Ok(StepStatus::Pending),
                }
            }
            StepAction::ReadValue {
                target,
                method,
                args,
                expect,
                ..
            } => {
                let address = outputs.resolve_address(name, target)?;
                let args = outputs.resolve_all(name, args)?;
                let value = client
                    .read(address, method, &args)
                    .await
                    .map_err(|e| DeploymentError::from_chain(name, e))?;
                let expectation_met = expect
                    .as_ref()
                    .map(|check| check_passes(name, check, &value, outputs))
                    .transpose()?;
                outputs.insert(name, value.clone());
                Ok(StepStatus::Value {
                    value,
                    expectation_met,
                })
            }
            StepAction::WriteDerivedValue { derivation, .. } => {
                let value = derive(name, derivation, outputs)?;
                outputs.insert(name, value.clone());
                Ok(StepStatus::Value {
                    value,
                    expectation_met: None,
                })
            }
        }
    }
}
