//! Compiled contract artifacts produced by hardhat.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Bytes;
use serde::Deserialize;

use crate::error::ChainError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    bytecode: Bytes,
}

/// Lookup of creation bytecode by contract name.
///
/// Hardhat lays artifacts out as `<root>/contracts/<Name>.sol/<Name>.json`.
#[derive(Debug, Clone)]
pub struct ContractArtifacts {
    root: PathBuf,
}

impl ContractArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn artifact_path(&self, contract: &str) -> PathBuf {
        self.root
            .join("contracts")
            .join(format!("{contract}.sol"))
            .join(format!("{contract}.json"))
    }

    /// Creation bytecode for `contract`.
    pub fn bytecode(&self, contract: &str) -> Result<Bytes, ChainError> {
        let path = self.artifact_path(contract);
        let artifact = load_artifact(&path)?;

        if artifact.contract_name != contract {
            return Err(ChainError::Transport(format!(
                "artifact {} describes `{}`, expected `{contract}`",
                path.display(),
                artifact.contract_name
            )));
        }
        if artifact.bytecode.is_empty() {
            return Err(ChainError::Transport(format!(
                "artifact {} has no bytecode (abstract contract or interface?)",
                path.display()
            )));
        }

        Ok(artifact.bytecode)
    }
}

fn load_artifact(path: &Path) -> Result<HardhatArtifact, ChainError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ChainError::Transport(format!("failed to read artifact {}: {e}", path.display()))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        ChainError::Transport(format!("failed to parse artifact {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn write_artifact(root: &Path, name: &str, body: &str) {
        let dir = root.join("contracts").join(format!("{name}.sol"));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{name}.json")), body).unwrap();
    }

    #[test]
    fn test_loads_bytecode() {
        let temp_dir = TempDir::new("greendish-artifacts").unwrap();
        write_artifact(
            temp_dir.path(),
            "GreenCoin",
            r#"{"_format":"hh-sol-artifact-1","contractName":"GreenCoin","abi":[],"bytecode":"0x6080604052","deployedBytecode":"0x"}"#,
        );

        let artifacts = ContractArtifacts::new(temp_dir.path());
        let bytecode = artifacts.bytecode("GreenCoin").unwrap();
        assert_eq!(bytecode.as_ref(), &[0x60, 0x80, 0x60, 0x40, 0x52]);
    }

    #[test]
    fn test_missing_or_empty_artifact() {
        let temp_dir = TempDir::new("greendish-artifacts").unwrap();
        write_artifact(
            temp_dir.path(),
            "IDish",
            r#"{"contractName":"IDish","bytecode":"0x"}"#,
        );

        let artifacts = ContractArtifacts::new(temp_dir.path());
        assert!(artifacts.bytecode("GreenDish").is_err());
        assert!(artifacts.bytecode("IDish").is_err());
    }
}
