//! Chain client abstraction.
//!
//! The executor only talks to the chain through [`ChainClient`]. Mutating calls
//! return a [`PendingTx`] as soon as the node accepted the transaction;
//! [`ChainClient::wait_confirmed`] is the single point where a run suspends until
//! the transaction is mined.

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes, U256};

use crate::{error::ChainError, value::Value};

mod artifacts;
mod client;
pub mod rpc;

pub use artifacts::ContractArtifacts;
pub use client::{RpcChainClient, RpcChainClientConfig};

/// A transaction accepted by the node but not necessarily mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTx {
    pub tx_hash: B256,
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    /// `false` when the transaction was mined but reverted.
    pub success: bool,
    pub block_number: Option<u64>,
    /// Address of the created contract for deployment transactions.
    pub contract_address: Option<Address>,
}

/// Operations the deployment needs from a blockchain node.
///
/// `method` arguments are human-readable Solidity signatures such as
/// `"transfer(address,uint256)"` or `"totalSupply() returns (uint256)"`.
pub trait ChainClient: Send + Sync {
    /// Chain id of the connected network.
    fn chain_id(&self) -> impl Future<Output = Result<u64, ChainError>> + Send;

    /// Runtime bytecode at `address`; empty when no contract lives there.
    fn code_at(&self, address: Address)
    -> impl Future<Output = Result<Bytes, ChainError>> + Send;

    /// Submit a contract creation for the named compiled contract.
    fn deploy_contract(
        &self,
        contract: &str,
        constructor_args: &[Value],
    ) -> impl Future<Output = Result<PendingTx, ChainError>> + Send;

    /// Submit a state-changing call.
    fn call(
        &self,
        address: Address,
        method: &str,
        args: &[Value],
        value: Option<U256>,
    ) -> impl Future<Output = Result<PendingTx, ChainError>> + Send;

    /// Execute a view call and return its first output.
    fn read(
        &self,
        address: Address,
        method: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<Value, ChainError>> + Send;

    /// Block until `tx` is mined. Callers bound this with their own timeout.
    fn wait_confirmed(
        &self,
        tx: &PendingTx,
    ) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send;
}
