//! The single source of truth handed from the executor to the publisher.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, B256};
use chrono::{DateTime, Utc};

use crate::{
    plan::{MARKETPLACE, TOKEN},
    value::Value,
};

/// A mutating step and the transaction that confirmed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTransaction {
    pub step: String,
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

/// Facts produced by a completed deployment run.
///
/// Immutable once built; only the executor and the address-update mode create
/// one, through [`ResultBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentResult {
    addresses: BTreeMap<String, Address>,
    facts: BTreeMap<String, Value>,
    labels: BTreeMap<String, String>,
    transactions: Vec<StepTransaction>,
    warnings: Vec<String>,
    timestamp: DateTime<Utc>,
    network_id: Option<u64>,
    network_name: Option<String>,
    config_hash: Option<String>,
}

impl DeploymentResult {
    pub fn addresses(&self) -> &BTreeMap<String, Address> {
        &self.addresses
    }

    pub fn address(&self, logical_name: &str) -> Option<Address> {
        self.addresses.get(logical_name).copied()
    }

    pub fn token_address(&self) -> Option<Address> {
        self.address(TOKEN)
    }

    pub fn marketplace_address(&self) -> Option<Address> {
        self.address(MARKETPLACE)
    }

    pub fn facts(&self) -> &BTreeMap<String, Value> {
        &self.facts
    }

    pub fn fact(&self, name: &str) -> Option<&Value> {
        self.facts.get(name)
    }

    /// Human readable labels such as the restaurant name.
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn transactions(&self) -> &[StepTransaction] {
        &self.transactions
    }

    /// Non-fatal verification mismatches observed during the run.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn network_id(&self) -> Option<u64> {
        self.network_id
    }

    pub fn network_name(&self) -> Option<&str> {
        self.network_name.as_deref()
    }

    pub fn config_hash(&self) -> Option<&str> {
        self.config_hash.as_deref()
    }
}

/// Accumulates a [`DeploymentResult`] while a run is in progress.
#[derive(Debug, Default)]
pub(crate) struct ResultBuilder {
    addresses: BTreeMap<String, Address>,
    facts: BTreeMap<String, Value>,
    labels: BTreeMap<String, String>,
    transactions: Vec<StepTransaction>,
    warnings: Vec<String>,
    network_id: Option<u64>,
    network_name: Option<String>,
    config_hash: Option<String>,
}

impl ResultBuilder {
    pub(crate) fn new(network_id: Option<u64>, network_name: Option<String>) -> Self {
        Self {
            network_id,
            network_name,
            ..Default::default()
        }
    }

    pub(crate) fn addresses(&self) -> &BTreeMap<String, Address> {
        &self.addresses
    }

    pub(crate) fn address(&mut self, logical_name: &str, address: Address) -> &mut Self {
        self.addresses.insert(logical_name.to_string(), address);
        self
    }

    pub(crate) fn fact(&mut self, name: &str, value: Value) -> &mut Self {
        self.facts.insert(name.to_string(), value);
        self
    }

    pub(crate) fn facts(&mut self, facts: BTreeMap<String, Value>) -> &mut Self {
        self.facts.extend(facts);
        self
    }

    pub(crate) fn label(&mut self, name: &str, value: &str) -> &mut Self {
        self.labels.insert(name.to_string(), value.to_string());
        self
    }

    pub(crate) fn transaction(&mut self, tx: StepTransaction) -> &mut Self {
        self.transactions.push(tx);
        self
    }

    pub(crate) fn warning(&mut self, warning: String) -> &mut Self {
        self.warnings.push(warning);
        self
    }

    pub(crate) fn config_hash(&mut self, hash: Option<String>) -> &mut Self {
        self.config_hash = hash;
        self
    }

    pub(crate) fn finish(self, timestamp: DateTime<Utc>) -> DeploymentResult {
        DeploymentResult {
            addresses: self.addresses,
            facts: self.facts,
            labels: self.labels,
            transactions: self.transactions,
            warnings: self.warnings,
            timestamp,
            network_id: self.network_id,
            network_name: self.network_name,
            config_hash: self.config_hash,
        }
    }
}
