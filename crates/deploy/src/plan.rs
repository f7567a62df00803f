//! Deployment plan.
//!
//! A [`Plan`] is a linear list of [`DeploymentStep`]s. Steps reference the
//! outputs of earlier steps by name, never later ones, so a single forward pass
//! always has every input available.

use std::collections::HashSet;

use alloy_core::primitives::U256;

use crate::{
    config::{AllocationStrategy, DeployConfig},
    error::ConfigError,
    value::Value,
};

/// Logical name of the token contract in results and manifests.
pub const TOKEN: &str = "token";
/// Logical name of the marketplace contract in results and manifests.
pub const MARKETPLACE: &str = "marketplace";

/// Fact names recorded by the standard plan.
pub mod facts {
    pub const TOTAL_SUPPLY: &str = "totalSupply";
    pub const REWARD_POOL_ALLOCATION: &str = "rewardPoolAllocation";
    pub const MARKETPLACE_TOKEN_CONTRACT: &str = "marketplaceTokenContract";
    pub const TOKEN_INITIALIZED: &str = "tokenInitialized";
    pub const MARKETPLACE_TOKEN_BALANCE: &str = "marketplaceTokenBalance";
}

/// The five provisioning phases, in execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, strum::EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Phase {
    DeployToken = 1,
    DeployMarketplace = 2,
    FundRewardPool = 3,
    SeedCatalog = 4,
    Verify = 5,
}

/// Where a step argument comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInput {
    Const(Value),
    /// Output of the earlier step with this name.
    Output(String),
}

impl StepInput {
    pub fn output(step: &str) -> Self {
        Self::Output(step.to_string())
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Const(value.into())
    }

    fn reference(&self) -> Option<&str> {
        match self {
            Self::Const(_) => None,
            Self::Output(step) => Some(step),
        }
    }
}

impl From<Value> for StepInput {
    fn from(value: Value) -> Self {
        Self::Const(value)
    }
}

/// A value computed locally from earlier outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derivation {
    /// `of * percent / 100`, truncating.
    Percentage { of: StepInput, percent: u8 },
}

impl Derivation {
    fn inputs(&self) -> Vec<&StepInput> {
        match self {
            Self::Percentage { of, .. } => vec![of],
        }
    }
}

/// Condition on a read value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Equals(StepInput),
    /// Unsigned integer greater than or equal to the input.
    AtLeast(StepInput),
}

impl Check {
    fn input(&self) -> &StepInput {
        match self {
            Self::Equals(input) | Self::AtLeast(input) => input,
        }
    }
}

/// A read used to decide whether an invoke step already took effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub target: StepInput,
    pub method: String,
    pub args: Vec<StepInput>,
    pub check: Check,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    DeployContract {
        /// Compiled contract name.
        contract: String,
        /// Logical name the address is recorded under.
        logical_name: String,
        args: Vec<StepInput>,
    },
    InvokeMethod {
        target: StepInput,
        method: String,
        args: Vec<StepInput>,
        value: Option<U256>,
        /// Only consulted when resuming or inspecting.
        satisfied_when: Option<Probe>,
    },
    ReadValue {
        target: StepInput,
        method: String,
        args: Vec<StepInput>,
        /// Makes this a verification read: a failed read or a mismatch is
        /// recorded as a warning, never fatal, so no later step may consume it.
        expect: Option<Check>,
        record_as: Option<String>,
    },
    WriteDerivedValue {
        derivation: Derivation,
        record_as: String,
    },
}

impl StepAction {
    /// Short action name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeployContract { .. } => "deploy-contract",
            Self::InvokeMethod { .. } => "invoke-method",
            Self::ReadValue { .. } => "read-value",
            Self::WriteDerivedValue { .. } => "write-derived-value",
        }
    }

    /// Whether the action changes chain state.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::DeployContract { .. } | Self::InvokeMethod { .. })
    }

    fn inputs(&self) -> Vec<&StepInput> {
        match self {
            Self::DeployContract { args, .. } => args.iter().collect(),
            Self::InvokeMethod {
                target,
                args,
                satisfied_when,
                ..
            } => {
                let mut inputs: Vec<&StepInput> = std::iter::once(target).chain(args).collect();
                if let Some(probe) = satisfied_when {
                    inputs.push(&probe.target);
                    inputs.extend(&probe.args);
                    inputs.push(probe.check.input());
                }
                inputs
            }
            Self::ReadValue {
                target,
                args,
                expect,
                ..
            } => std::iter::once(target)
                .chain(args)
                .chain(expect.as_ref().map(Check::input))
                .collect(),
            Self::WriteDerivedValue { derivation, .. } => derivation.inputs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentStep {
    pub name: String,
    pub phase: Phase,
    pub action: StepAction,
}

impl DeploymentStep {
    pub fn new(name: &str, phase: Phase, action: StepAction) -> Self {
        Self {
            name: name.to_string(),
            phase,
            action,
        }
    }
}

/// An ordered, validated list of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    steps: Vec<DeploymentStep>,
}

impl Plan {
    /// Validate step ordering: unique names, phases never going backwards, and
    /// every referenced output produced by a strictly earlier step.
    pub fn new(steps: Vec<DeploymentStep>) -> Result<Self, ConfigError> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut verifications: HashSet<&str> = HashSet::new();
        let mut last_phase = None;

        for step in &steps {
            if last_phase.is_some_and(|phase| step.phase < phase) {
                return Err(ConfigError::InvalidPlan(format!(
                    "step `{}` (phase {}) comes after a later phase",
                    step.name, step.phase
                )));
            }
            last_phase = Some(step.phase);

            for reference in step.action.inputs().into_iter().filter_map(StepInput::reference) {
                if !seen.contains(reference) {
                    return Err(ConfigError::InvalidPlan(format!(
                        "step `{}` references `{reference}`, which is not an earlier step",
                        step.name
                    )));
                }
                if verifications.contains(reference) {
                    return Err(ConfigError::InvalidPlan(format!(
                        "step `{}` consumes `{reference}`, which is a verification read",
                        step.name
                    )));
                }
            }

            if matches!(step.action, StepAction::ReadValue { expect: Some(_), .. }) {
                verifications.insert(&step.name);
            }

            if !seen.insert(&step.name) {
                return Err(ConfigError::InvalidPlan(format!(
                    "duplicate step name `{}`",
                    step.name
                )));
            }
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[DeploymentStep] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&DeploymentStep> {
        self.steps.iter().find(|step| step.name == name)
    }
}

/// Build the standard provisioning plan from a validated configuration.
///
/// Order: deploy token, deploy marketplace with the token address, fund the
/// reward pool, seed one catalog listing, read back the wiring.
pub fn build_plan(config: &DeployConfig) -> Result<Plan, ConfigError> {
    config.validate()?;

    let listing = &config.listing;
    let percent = config.token.ecosystem_percentage;
    let token = StepInput::output("deploy_token");
    let marketplace = StepInput::output("deploy_marketplace");
    let allocation = StepInput::output("reward_pool_allocation");

    let marketplace_balance = |check: Check| Probe {
        target: token.clone(),
        method: "balanceOf(address) returns (uint256)".to_string(),
        args: vec![marketplace.clone()],
        check,
    };

    let (allocation_method, allocation_args) = match config.token.allocation {
        AllocationStrategy::Transfer => (
            "transfer(address,uint256)",
            vec![marketplace.clone(), allocation.clone()],
        ),
        AllocationStrategy::RewardPoolMethod => {
            ("allocateToRewardPool(address)", vec![marketplace.clone()])
        }
    };

    let steps = vec![
        DeploymentStep::new(
            "deploy_token",
            Phase::DeployToken,
            StepAction::DeployContract {
                contract: config.token.contract.clone(),
                logical_name: TOKEN.to_string(),
                args: vec![],
            },
        ),
        DeploymentStep::new(
            "deploy_marketplace",
            Phase::DeployMarketplace,
            StepAction::DeployContract {
                contract: config.marketplace.contract.clone(),
                logical_name: MARKETPLACE.to_string(),
                args: vec![token.clone()],
            },
        ),
        DeploymentStep::new(
            "read_total_supply",
            Phase::FundRewardPool,
            StepAction::ReadValue {
                target: token.clone(),
                method: "totalSupply() returns (uint256)".to_string(),
                args: vec![],
                expect: None,
                record_as: Some(facts::TOTAL_SUPPLY.to_string()),
            },
        ),
        DeploymentStep::new(
            "reward_pool_allocation",
            Phase::FundRewardPool,
            StepAction::WriteDerivedValue {
                derivation: Derivation::Percentage {
                    of: StepInput::output("read_total_supply"),
                    percent,
                },
                record_as: facts::REWARD_POOL_ALLOCATION.to_string(),
            },
        ),
        DeploymentStep::new(
            "allocate_reward_pool",
            Phase::FundRewardPool,
            StepAction::InvokeMethod {
                target: token.clone(),
                method: allocation_method.to_string(),
                args: allocation_args,
                value: None,
                satisfied_when: Some(marketplace_balance(Check::AtLeast(allocation.clone()))),
            },
        ),
        DeploymentStep::new(
            "seed_catalog",
            Phase::SeedCatalog,
            StepAction::InvokeMethod {
                target: marketplace.clone(),
                method: "createDish(string,string,uint256,uint256,uint256,string,string)"
                    .to_string(),
                args: vec![
                    StepInput::constant(listing.restaurant_name.as_str()),
                    StepInput::constant(listing.dish_name.as_str()),
                    StepInput::constant(listing.price_wei()?),
                    StepInput::constant(listing.inventory),
                    StepInput::constant(listing.carbon_credits),
                    StepInput::constant(listing.main_component.as_str()),
                    StepInput::constant(listing.supply_source.as_str()),
                ],
                value: None,
                satisfied_when: Some(Probe {
                    target: marketplace.clone(),
                    method: "dishCount() returns (uint256)".to_string(),
                    args: vec![],
                    check: Check::AtLeast(StepInput::constant(1u64)),
                }),
            },
        ),
        DeploymentStep::new(
            "verify_token_contract",
            Phase::Verify,
            StepAction::ReadValue {
                target: marketplace.clone(),
                method: "tokenContract() returns (address)".to_string(),
                args: vec![],
                expect: Some(Check::Equals(token.clone())),
                record_as: Some(facts::MARKETPLACE_TOKEN_CONTRACT.to_string()),
            },
        ),
        DeploymentStep::new(
            "verify_token_initialized",
            Phase::Verify,
            StepAction::ReadValue {
                target: marketplace.clone(),
                method: "tokenInitialized() returns (bool)".to_string(),
                args: vec![],
                expect: Some(Check::Equals(StepInput::constant(true))),
                record_as: Some(facts::TOKEN_INITIALIZED.to_string()),
            },
        ),
        DeploymentStep::new(
            "verify_marketplace_balance",
            Phase::Verify,
            StepAction::ReadValue {
                target: token,
                method: "balanceOf(address) returns (uint256)".to_string(),
                args: vec![marketplace],
                expect: Some(Check::Equals(allocation)),
                record_as: Some(facts::MARKETPLACE_TOKEN_BALANCE.to_string()),
            },
        ),
    ];

    Plan::new(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_plan_follows_fixed_phase_order() {
        let plan = build_plan(&DeployConfig::default()).unwrap();

        let phases: Vec<Phase> = plan.steps().iter().map(|step| step.phase).collect();
        let mut distinct = phases.clone();
        distinct.dedup();
        assert_eq!(distinct, Phase::iter().collect::<Vec<_>>());

        let first_mutations: Vec<&str> = plan
            .steps()
            .iter()
            .filter(|step| step.action.is_mutating())
            .map(|step| step.name.as_str())
            .collect();
        assert_eq!(
            first_mutations,
            [
                "deploy_token",
                "deploy_marketplace",
                "allocate_reward_pool",
                "seed_catalog"
            ]
        );
    }

    #[test]
    fn test_marketplace_constructor_takes_token_address() {
        let plan = build_plan(&DeployConfig::default()).unwrap();
        let step = plan.step("deploy_marketplace").unwrap();

        match &step.action {
            StepAction::DeployContract {
                contract,
                logical_name,
                args,
            } => {
                assert_eq!(contract, "GreenDish");
                assert_eq!(logical_name, MARKETPLACE);
                assert_eq!(args, &vec![StepInput::output("deploy_token")]);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_seed_catalog_uses_listing_fields() {
        let mut config = DeployConfig::default();
        config.listing.dish_name = "Quinoa Bowl".to_string();
        config.listing.price_eth = "0.5".to_string();
        let plan = build_plan(&config).unwrap();

        let StepAction::InvokeMethod { args, .. } = &plan.step("seed_catalog").unwrap().action
        else {
            panic!("seed_catalog must invoke a method");
        };
        assert_eq!(args.len(), 7);
        assert_eq!(args[1], StepInput::constant("Quinoa Bowl"));
        assert_eq!(
            args[2],
            StepInput::constant(U256::from(500_000_000_000_000_000u64))
        );
    }

    #[test]
    fn test_reward_pool_method_strategy() {
        let mut config = DeployConfig::default();
        config.token.allocation = AllocationStrategy::RewardPoolMethod;
        let plan = build_plan(&config).unwrap();

        let StepAction::InvokeMethod { method, args, .. } =
            &plan.step("allocate_reward_pool").unwrap().action
        else {
            panic!("allocate_reward_pool must invoke a method");
        };
        assert_eq!(method, "allocateToRewardPool(address)");
        assert_eq!(args, &vec![StepInput::output("deploy_marketplace")]);
    }

    #[test]
    fn test_invalid_config_fails_before_planning() {
        let mut config = DeployConfig::default();
        config.token.ecosystem_percentage = 150;
        assert!(matches!(
            build_plan(&config),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_forward_reference_rejected() {
        let steps = vec![
            DeploymentStep::new(
                "deploy_marketplace",
                Phase::DeployMarketplace,
                StepAction::DeployContract {
                    contract: "GreenDish".to_string(),
                    logical_name: MARKETPLACE.to_string(),
                    args: vec![StepInput::output("deploy_token")],
                },
            ),
            DeploymentStep::new(
                "deploy_token",
                Phase::DeployMarketplace,
                StepAction::DeployContract {
                    contract: "GreenCoin".to_string(),
                    logical_name: TOKEN.to_string(),
                    args: vec![],
                },
            ),
        ];
        assert!(matches!(Plan::new(steps), Err(ConfigError::InvalidPlan(_))));
    }

    #[test]
    fn test_self_reference_and_duplicates_rejected() {
        let read = |name: &str, target: &str| {
            DeploymentStep::new(
                name,
                Phase::Verify,
                StepAction::ReadValue {
                    target: StepInput::output(target),
                    method: "dishCount() returns (uint256)".to_string(),
                    args: vec![],
                    expect: None,
                    record_as: None,
                },
            )
        };
        assert!(Plan::new(vec![read("a", "a")]).is_err());

        let deploy = DeploymentStep::new(
            "a",
            Phase::DeployToken,
            StepAction::DeployContract {
                contract: "GreenCoin".to_string(),
                logical_name: TOKEN.to_string(),
                args: vec![],
            },
        );
        assert!(Plan::new(vec![deploy.clone(), read("a", "a")]).is_err());
        assert!(Plan::new(vec![deploy, read("b", "a")]).is_ok());
    }

    #[test]
    fn test_verification_output_cannot_be_consumed() {
        let deploy = DeploymentStep::new(
            "deploy_token",
            Phase::DeployToken,
            StepAction::DeployContract {
                contract: "GreenCoin".to_string(),
                logical_name: TOKEN.to_string(),
                args: vec![],
            },
        );
        let verify = DeploymentStep::new(
            "verify_supply",
            Phase::Verify,
            StepAction::ReadValue {
                target: StepInput::output("deploy_token"),
                method: "totalSupply() returns (uint256)".to_string(),
                args: vec![],
                expect: Some(Check::AtLeast(StepInput::constant(1u64))),
                record_as: None,
            },
        );
        let derive = DeploymentStep::new(
            "half_supply",
            Phase::Verify,
            StepAction::WriteDerivedValue {
                derivation: Derivation::Percentage {
                    of: StepInput::output("verify_supply"),
                    percent: 50,
                },
                record_as: "halfSupply".to_string(),
            },
        );

        let err = Plan::new(vec![deploy, verify, derive]).unwrap_err();
        assert!(err.to_string().contains("verification read"), "{err}");
    }
}
