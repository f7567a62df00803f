//! [`ChainClient`] backed by a JSON-RPC endpoint.

use std::{path::PathBuf, time::Duration};

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_core::{
    dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt},
    json_abi::Function,
    primitives::{Address, B256, Bytes, TxKind, U256},
};
use alloy_eips::eip2718::Encodable2718;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use serde::Deserialize;
use serde_json::json;

use super::{
    ChainClient, ContractArtifacts, PendingTx, TxReceipt,
    rpc::{self, json_rpc_call, parse_quantity},
};
use crate::{error::ChainError, value::Value};

/// Priority fee cap used for locally signed transactions (1 gwei).
const MAX_PRIORITY_FEE: u128 = 1_000_000_000;

/// Connection settings for [`RpcChainClient`].
#[derive(Debug, Clone)]
pub struct RpcChainClientConfig {
    pub rpc_url: String,
    pub artifacts_dir: PathBuf,
    /// Hex private key. Without it, transactions are sent from the node's first
    /// unlocked account (hardhat and anvil dev nodes).
    pub private_key: Option<String>,
    pub poll_interval: Duration,
}

enum Sender {
    Local(PrivateKeySigner),
    Node,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    status: Option<String>,
    block_number: Option<String>,
    contract_address: Option<Address>,
}

pub struct RpcChainClient {
    http: reqwest::Client,
    url: String,
    artifacts: ContractArtifacts,
    sender: Sender,
    poll_interval: Duration,
}

impl RpcChainClient {
    pub fn new(config: RpcChainClientConfig) -> Result<Self, ChainError> {
        let sender = match config.private_key {
            Some(key) => {
                let signer: PrivateKeySigner = key
                    .trim()
                    .parse()
                    .map_err(|e| ChainError::Transport(format!("invalid private key: {e}")))?;
                tracing::info!(sender = %signer.address(), "Signing transactions locally");
                Sender::Local(signer)
            }
            None => {
                tracing::info!("No signing key configured, using the node's first account");
                Sender::Node
            }
        };

        Ok(Self {
            http: rpc::create_client()?,
            url: config.rpc_url,
            artifacts: ContractArtifacts::new(config.artifacts_dir),
            sender,
            poll_interval: config.poll_interval,
        })
    }

    async fn rpc<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T, ChainError> {
        json_rpc_call(&self.http, &self.url, method, params)
            .await
            .map_err(ChainError::from)
    }

    async fn sender_address(&self) -> Result<Address, ChainError> {
        match &self.sender {
            Sender::Local(signer) => Ok(signer.address()),
            Sender::Node => {
                let accounts: Vec<Address> = self.rpc("eth_accounts", vec![]).await?;
                accounts.first().copied().ok_or_else(|| {
                    ChainError::Transport(
                        "node has no unlocked accounts and no private key was given".to_string(),
                    )
                })
            }
        }
    }

    async fn send(
        &self,
        to: Option<Address>,
        input: Bytes,
        value: U256,
    ) -> Result<PendingTx, ChainError> {
        let from = self.sender_address().await?;
        let mut request = json!({
            "from": from,
            "data": input,
            "value": value,
        });
        if let Some(to) = to {
            request["to"] = json!(to);
        }

        let tx_hash: B256 = match &self.sender {
            Sender::Node => self.rpc("eth_sendTransaction", vec![request]).await?,
            Sender::Local(signer) => {
                let raw = self.sign(signer, request, to, input, value).await?;
                self.rpc("eth_sendRawTransaction", vec![json!(raw)]).await?
            }
        };

        tracing::debug!(%tx_hash, %from, to = ?to, "Transaction submitted");
        Ok(PendingTx { tx_hash })
    }

    /// Build and sign an EIP-1559 transaction. Gas estimation doubles as a
    /// pre-flight check: a call that would revert fails here with its reason.
    async fn sign(
        &self,
        signer: &PrivateKeySigner,
        request: serde_json::Value,
        to: Option<Address>,
        input: Bytes,
        value: U256,
    ) -> Result<Bytes, ChainError> {
        let chain_id = self.chain_id().await?;
        let nonce: String = self
            .rpc(
                "eth_getTransactionCount",
                vec![json!(signer.address()), json!("pending")],
            )
            .await?;
        let gas: String = self.rpc("eth_estimateGas", vec![request]).await?;
        let gas_price: String = self.rpc("eth_gasPrice", vec![]).await?;

        let gas_price = u128::from(parse_quantity(&gas_price)?);
        let tx = TxEip1559 {
            chain_id,
            nonce: parse_quantity(&nonce)?,
            gas_limit: parse_quantity(&gas)?.saturating_mul(12) / 10,
            max_fee_per_gas: gas_price.saturating_mul(2),
            max_priority_fee_per_gas: gas_price.min(MAX_PRIORITY_FEE),
            to: to.map_or(TxKind::Create, TxKind::Call),
            value,
            access_list: Default::default(),
            input,
        };

        let signature = signer
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| ChainError::Transport(format!("failed to sign transaction: {e}")))?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));

        Ok(Bytes::from(envelope.encoded_2718()))
    }
}

impl ChainClient for RpcChainClient {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        let id: String = self.rpc("eth_chainId", vec![]).await?;
        parse_quantity(&id)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ChainError> {
        self.rpc("eth_getCode", vec![json!(address), json!("latest")])
            .await
    }

    async fn deploy_contract(
        &self,
        contract: &str,
        constructor_args: &[Value],
    ) -> Result<PendingTx, ChainError> {
        let bytecode = self.artifacts.bytecode(contract)?;
        let params = DynSolValue::Tuple(constructor_args.iter().map(to_sol_value).collect())
            .abi_encode_params();

        let mut input = bytecode.to_vec();
        input.extend_from_slice(&params);

        self.send(None, Bytes::from(input), U256::ZERO).await
    }

    async fn call(
        &self,
        address: Address,
        method: &str,
        args: &[Value],
        value: Option<U256>,
    ) -> Result<PendingTx, ChainError> {
        let function = parse_function(method)?;
        let input = encode_input(&function, args)?;
        self.send(Some(address), input, value.unwrap_or_default())
            .await
    }

    async fn read(&self, address: Address, method: &str, args: &[Value]) -> Result<Value, ChainError> {
        let function = parse_function(method)?;
        let input = encode_input(&function, args)?;

        let output: Bytes = self
            .rpc(
                "eth_call",
                vec![json!({ "to": address, "data": input }), json!("latest")],
            )
            .await?;

        if output.is_empty() {
            return Err(ChainError::Transport(format!(
                "{} returned no data; is there a contract at {address}?",
                function.name
            )));
        }

        let decoded = function.abi_decode_output(&output).map_err(|e| {
            ChainError::Transport(format!("failed to decode {} output: {e}", function.name))
        })?;

        decoded
            .into_iter()
            .next()
            .and_then(from_sol_value)
            .ok_or_else(|| {
                ChainError::Transport(format!(
                    "{} returned no value of a supported type",
                    function.name
                ))
            })
    }

    async fn wait_confirmed(&self, tx: &PendingTx) -> Result<TxReceipt, ChainError> {
        loop {
            let receipt: Option<RpcReceipt> = self
                .rpc("eth_getTransactionReceipt", vec![json!(tx.tx_hash)])
                .await
                .map_err(|e| receipt_unavailable(tx.tx_hash, e))?;

            if let Some(receipt) = receipt {
                let block_number = receipt
                    .block_number
                    .as_deref()
                    .map(parse_quantity)
                    .transpose()?;
                // Pre-byzantium receipts carry no status; treat them as successful.
                let success = receipt.status.as_deref().map_or(true, |s| s != "0x0");

                return Ok(TxReceipt {
                    tx_hash: receipt.transaction_hash,
                    success,
                    block_number,
                    contract_address: receipt.contract_address,
                });
            }

            tracing::trace!(tx_hash = %tx.tx_hash, "Receipt not available yet, retrying...");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// The transaction was submitted, so its outcome is unknown rather than failed.
fn receipt_unavailable(tx_hash: B256, err: ChainError) -> ChainError {
    match err {
        ChainError::Transport(reason) => ChainError::Transport(format!(
            "lost track of transaction {tx_hash}: {reason}; it may still land, check the chain before starting a new run"
        )),
        other => other,
    }
}

fn parse_function(method: &str) -> Result<Function, ChainError> {
    let signature = if method.trim_start().starts_with("function ") {
        method.to_string()
    } else {
        format!("function {method}")
    };
    Function::parse(&signature)
        .map_err(|e| ChainError::Transport(format!("invalid method signature '{method}': {e}")))
}

fn encode_input(function: &Function, args: &[Value]) -> Result<Bytes, ChainError> {
    let values: Vec<DynSolValue> = args.iter().map(to_sol_value).collect();
    function
        .abi_encode_input(&values)
        .map(Bytes::from)
        .map_err(|e| {
            ChainError::Transport(format!("failed to encode {} arguments: {e}", function.name))
        })
}

fn to_sol_value(value: &Value) -> DynSolValue {
    match value {
        Value::Address(address) => DynSolValue::Address(*address),
        Value::Uint(value) => DynSolValue::Uint(*value, 256),
        Value::Bool(value) => DynSolValue::Bool(*value),
        Value::String(value) => DynSolValue::String(value.clone()),
    }
}

fn from_sol_value(value: DynSolValue) -> Option<Value> {
    match value {
        DynSolValue::Address(address) => Some(Value::Address(address)),
        DynSolValue::Uint(value, _) => Some(Value::Uint(value)),
        DynSolValue::Bool(value) => Some(Value::Bool(value)),
        DynSolValue::String(value) => Some(Value::String(value)),
        _ => None,
    }
}
