//! Error types for planning, executing and publishing a deployment.

use std::{fmt, path::PathBuf, time::Duration};

use alloy_core::primitives::B256;

use crate::publish::ArtifactKind;

/// Invalid or missing input detected before any chain or file interaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required value: {field}")]
    Missing { field: &'static str },

    #[error("{field} is out of range: got {value}, expected {expected}")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("failed to load configuration: {0}")]
    Load(String),
}

/// Failure reported by the chain client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The chain could not be reached or answered with something unusable.
    #[error("transport error: {0}")]
    Transport(String),

    /// The chain executed the transaction and rejected it.
    #[error("transaction reverted: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Revert { reason: Option<String> },
}

/// Definitive failure of a deployment run.
///
/// Every variant raised after the run started names the step that failed.
#[derive(Debug, thiserror::Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("step `{step}` failed to reach the chain: {reason}")]
    ChainTransport { step: String, reason: String },

    #[error("step `{step}` was rejected by the chain: {}", .reason.as_deref().unwrap_or("no reason given"))]
    ChainRevert {
        step: String,
        reason: Option<String>,
    },

    #[error(
        "step `{step}` was not confirmed within {}s (tx {tx_hash}); the transaction may still land, check the chain before starting a new run",
        .waited.as_secs()
    )]
    ConfirmationTimeout {
        step: String,
        tx_hash: B256,
        waited: Duration,
    },

    #[error("step `{step}` references `{reference}` which has produced no output")]
    UnresolvedInput { step: String, reference: String },

    #[error("step `{step}` expected {expected} but got {found}")]
    InvalidInput {
        step: String,
        expected: &'static str,
        found: String,
    },
}

impl DeploymentError {
    /// Wrap a chain client error with the step it occurred in.
    pub fn from_chain(step: &str, err: ChainError) -> Self {
        match err {
            ChainError::Transport(reason) => Self::ChainTransport {
                step: step.to_string(),
                reason,
            },
            ChainError::Revert { reason } => Self::ChainRevert {
                step: step.to_string(),
                reason,
            },
        }
    }

    /// Stable identifier used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::ChainTransport { .. } => "chain-transport",
            Self::ChainRevert { .. } => "chain-revert",
            Self::ConfirmationTimeout { .. } => "confirmation-timeout",
            Self::UnresolvedInput { .. } => "unresolved-input",
            Self::InvalidInput { .. } => "invalid-input",
        }
    }

    /// Name of the failing step, if the run had started.
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::Configuration(_) => None,
            Self::ChainTransport { step, .. }
            | Self::ChainRevert { step, .. }
            | Self::ConfirmationTimeout { step, .. }
            | Self::UnresolvedInput { step, .. }
            | Self::InvalidInput { step, .. } => Some(step),
        }
    }
}

/// Why a single artifact could not be published.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no `{label}: \"0x...\"` address assignment found (stale or incompatible template)")]
    PatternNotFound { label: String },

    #[error("`{label}` address assignment appears {count} times, refusing to guess")]
    AmbiguousPattern { label: String, count: usize },

    #[error("no address recorded for logical contract `{name}`")]
    MissingAddress { name: String },

    #[error("invalid pattern for label `{label}`: {reason}")]
    InvalidLabel { label: String, reason: String },
}

/// A failed artifact together with where it was headed.
#[derive(Debug)]
pub struct ArtifactFailure {
    pub artifact: ArtifactKind,
    pub path: PathBuf,
    pub cause: ArtifactError,
}

impl fmt::Display for ArtifactFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.artifact, self.path.display(), self.cause)
    }
}

/// One or more downstream artifacts could not be written.
///
/// Chain state is untouched by this error: the deployment itself succeeded.
#[derive(Debug)]
pub struct PublishError {
    pub failures: Vec<ArtifactFailure>,
}

impl PublishError {
    pub fn kind(&self) -> &'static str {
        "publish"
    }
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} artifact(s) failed to publish", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for PublishError {}
