//! Writes a finished [`DeploymentResult`] to every downstream artifact.
//!
//! Targets are independent: a failing target is recorded and the remaining
//! ones are still attempted. Each file is replaced atomically.

pub mod config_module;
pub mod manifest;
pub mod summary;

use std::path::{Path, PathBuf};

use crate::{
    config::DeployConfig,
    error::{ArtifactError, ArtifactFailure, PublishError},
    fs::FsHandler,
    plan::{MARKETPLACE, TOKEN},
    result::DeploymentResult,
};

pub use manifest::ManifestRecord;

/// The external formats a deployment result is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ArtifactKind {
    JsonManifest,
    GeneratedConfigModule,
    SummaryReport,
}

/// A single file to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactTarget {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

impl ArtifactTarget {
    pub fn new(kind: ArtifactKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// What happened to one target during a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifact {
    pub target: ArtifactTarget,
    /// `false` when the file already held the rendered content.
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct Publisher {
    targets: Vec<ArtifactTarget>,
    /// Config module label for each logical contract name.
    labels: Vec<(String, String)>,
}

impl Publisher {
    /// A publisher using the default `GreenCoin` / `GreenDish` config module labels.
    pub fn new(targets: Vec<ArtifactTarget>) -> Self {
        Self {
            targets,
            labels: vec![
                (TOKEN.to_string(), "GreenCoin".to_string()),
                (MARKETPLACE.to_string(), "GreenDish".to_string()),
            ],
        }
    }

    pub fn from_config(config: &DeployConfig) -> Self {
        let publish = &config.publish;
        let mut targets: Vec<ArtifactTarget> = publish
            .manifests
            .iter()
            .map(|path| ArtifactTarget::new(ArtifactKind::JsonManifest, path))
            .collect();
        if let Some(path) = &publish.config_module {
            targets.push(ArtifactTarget::new(ArtifactKind::GeneratedConfigModule, path));
        }
        if let Some(path) = &publish.summary {
            targets.push(ArtifactTarget::new(ArtifactKind::SummaryReport, path));
        }

        Self {
            targets,
            labels: vec![
                (TOKEN.to_string(), config.token.label.clone()),
                (MARKETPLACE.to_string(), config.marketplace.label.clone()),
            ],
        }
    }

    /// Override the config module label used for `logical_name`.
    pub fn with_label(mut self, logical_name: &str, label: &str) -> Self {
        match self.labels.iter_mut().find(|(name, _)| name == logical_name) {
            Some(entry) => entry.1 = label.to_string(),
            None => self.labels.push((logical_name.to_string(), label.to_string())),
        }
        self
    }

    pub fn targets(&self) -> &[ArtifactTarget] {
        &self.targets
    }

    /// Manifest paths, in configured order.
    pub fn manifest_paths(&self) -> impl Iterator<Item = &Path> {
        self.targets
            .iter()
            .filter(|target| target.kind == ArtifactKind::JsonManifest)
            .map(|target| target.path.as_path())
    }

    /// The first manifest that exists and parses, if any.
    pub fn read_existing_manifest(&self) -> Option<(PathBuf, ManifestRecord)> {
        self.manifest_paths().find_map(|path| {
            if !path.exists() {
                return None;
            }
            match ManifestRecord::load(path) {
                Ok(record) => Some((path.to_path_buf(), record)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable manifest");
                    None
                }
            }
        })
    }

    /// Render `result` into every target.
    ///
    /// Fails if any target failed, listing each failure. Targets that succeeded
    /// stay written.
    pub fn publish(&self, result: &DeploymentResult) -> Result<Vec<PublishedArtifact>, PublishError> {
        let mut published = Vec::with_capacity(self.targets.len());
        let mut failures = Vec::new();

        for target in &self.targets {
            match self.publish_target(target, result) {
                Ok(changed) => {
                    if changed {
                        tracing::info!(
                            artifact = %target.kind,
                            path = %target.path.display(),
                            "Artifact written"
                        );
                    } else {
                        tracing::info!(
                            artifact = %target.kind,
                            path = %target.path.display(),
                            "Artifact already up to date"
                        );
                    }
                    published.push(PublishedArtifact {
                        target: target.clone(),
                        changed,
                    });
                }
                Err(cause) => {
                    tracing::error!(
                        artifact = %target.kind,
                        path = %target.path.display(),
                        error = %cause,
                        "Failed to publish artifact"
                    );
                    failures.push(ArtifactFailure {
                        artifact: target.kind,
                        path: target.path.clone(),
                        cause,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(published)
        } else {
            Err(PublishError { failures })
        }
    }

    fn publish_target(
        &self,
        target: &ArtifactTarget,
        result: &DeploymentResult,
    ) -> Result<bool, ArtifactError> {
        let content = match target.kind {
            ArtifactKind::JsonManifest => manifest::render(result)?,
            ArtifactKind::SummaryReport => summary::render(result)?,
            ArtifactKind::GeneratedConfigModule => {
                // Never created from scratch: the module carries more than addresses.
                let existing = std::fs::read_to_string(&target.path)?;
                let assignments = self
                    .labels
                    .iter()
                    .map(|(name, label)| {
                        result
                            .address(name)
                            .map(|address| (label.as_str(), address))
                            .ok_or_else(|| ArtifactError::MissingAddress { name: name.clone() })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                config_module::patch_all(&existing, assignments)?
            }
        };

        Ok(FsHandler::write_atomic(&target.path, &content)?)
    }
}
