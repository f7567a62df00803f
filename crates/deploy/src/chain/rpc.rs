//! JSON-RPC transport for Ethereum endpoints.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ChainError;

/// Default timeout for a single RPC request.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error returned by a JSON-RPC endpoint or while reaching it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    #[error("{method} request failed: {reason}")]
    Transport { method: String, reason: String },

    #[error("{method} returned RPC error {code}: {message}")]
    Response {
        method: String,
        code: i64,
        message: String,
    },
}

impl From<RpcError> for ChainError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Response { message, .. } if message.to_lowercase().contains("revert") => {
                ChainError::Revert {
                    reason: revert_reason(&message),
                }
            }
            other => ChainError::Transport(other.to_string()),
        }
    }
}

/// Extract the human readable part of a node's revert message.
///
/// Nodes report e.g. `execution reverted: ERC20: insufficient balance` or
/// `VM Exception while processing transaction: reverted with reason string 'x'`.
fn revert_reason(message: &str) -> Option<String> {
    if let Some(start) = message.find("reason string '") {
        let rest = &message[start + "reason string '".len()..];
        return rest.split('\'').next().map(str::to_string);
    }
    message
        .split_once("reverted:")
        .map(|(_, reason)| reason.trim().to_string())
        .filter(|reason| !reason.is_empty())
}

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, ChainError> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(|e| ChainError::Transport(format!("failed to create HTTP client: {e}")))
}

/// Make a JSON-RPC call and deserialize the result.
///
/// A `null` result deserializes into `Option::None` when `T` is an option, which
/// is how pending receipts are reported.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, RpcError> {
    let transport = |reason: String| RpcError::Transport {
        method: method.to_string(),
        reason,
    };

    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .map_err(|e| transport(e.to_string()))?;

    let result: Value = response
        .json()
        .await
        .map_err(|e| transport(format!("failed to parse response: {e}")))?;

    if let Some(error) = result.get("error") {
        return Err(RpcError::Response {
            method: method.to_string(),
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
                .to_string(),
        });
    }

    let result_value = result
        .get("result")
        .cloned()
        .ok_or_else(|| transport("no result in response".to_string()))?;

    serde_json::from_value(result_value)
        .map_err(|e| transport(format!("failed to deserialize result: {e}")))
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(s: &str) -> Result<u64, ChainError> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| ChainError::Transport(format!("invalid hex quantity '{s}': {e}")))
}
