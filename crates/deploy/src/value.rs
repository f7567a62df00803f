//! Values exchanged with the chain and recorded as deployment facts.

use std::{fmt, str::FromStr};

use alloy_core::primitives::{Address, U256};

/// A typed argument or return value.
///
/// `Display` renders integers in decimal, which is how facts are written to the
/// manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Address(Address),
    Uint(U256),
    Bool(bool),
    String(String),
}

impl Value {
    pub fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address(address) => Some(*address),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            Self::Uint(value) => Some(*value),
            _ => None,
        }
    }

    /// Short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Address(_) => "address",
            Self::Uint(_) => "uint256",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => write!(f, "{address}"),
            Self::Uint(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}

impl From<Address> for Value {
    fn from(value: Address) -> Self {
        Self::Address(value)
    }
}

impl From<U256> for Value {
    fn from(value: U256) -> Self {
        Self::Uint(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Uint(U256::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Parse an address that must be exactly `0x` followed by 40 hex characters.
///
/// Mixed case is accepted without enforcing the EIP-55 checksum, matching what
/// the generated config module pattern accepts.
pub fn parse_address(addr: &str) -> Result<Address, String> {
    if !addr.starts_with("0x") || addr.len() != 42 {
        return Err(format!(
            "Invalid address format: expected 0x-prefixed 40 hex chars, got '{addr}'"
        ));
    }

    if !addr[2..].chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!(
            "Invalid address: contains non-hex characters: '{addr}'"
        ));
    }

    Address::from_str(addr).map_err(|e| format!("Invalid address '{addr}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_valid() {
        assert!(parse_address("0x70997970C51812dc3A010C7d01b50e0d17dc79C8").is_ok());
        assert!(parse_address("0x0000000000000000000000000000000000000000").is_ok());
        assert!(parse_address("0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef").is_ok());
    }

    #[test]
    fn test_parse_address_invalid() {
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("1234567890abcdef1234567890abcdef12345678").is_err());
        assert!(parse_address("0xGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG").is_err());
        assert!(parse_address("0x5FbDB2315678afecb367f032d93F642f64180aa3f").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_uint_displays_in_decimal() {
        let value = Value::Uint(U256::from(10u64).pow(U256::from(24u64)));
        assert_eq!(value.to_string(), "1000000000000000000000000");
        assert_eq!(Value::from(true).to_string(), "true");
    }
}
