//! Configuration specification types for the portal.
//!
//! This module defines the structs that map to the `terradeck.yaml` file.
//! Secrets are never part of the file; they come from the environment
//! (`TERRADECK_BLOB_SAS`, `TERRADECK_PIPELINE_TOKEN`).

use serde::{Deserialize, Serialize};

/// The root configuration structure for a Terradeck installation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortalConfig {
    /// Project-level configuration.
    pub project: ProjectConfig,
    /// Inventory storage configuration.
    #[serde(default)]
    pub inventory: InventoryConfig,
    /// Action executor configuration.
    #[serde(default)]
    pub executor: ExecutorConfig,
}

/// Project-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Unique name for the project.
    pub name: String,
    /// Environment (e.g., "dev", "staging", "prod").
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Default Azure location for rendered resources.
    #[serde(default)]
    pub location: Option<String>,
}

/// Inventory storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct InventoryConfig {
    /// Local inventory file path. Defaults to `.terradeck/inventory.json`.
    #[serde(default)]
    pub path: Option<String>,
    /// Azure Blob mirror. When set, every save is mirrored to the blob.
    #[serde(default)]
    pub blob: Option<BlobConfig>,
}

/// Azure Blob Storage mirror configuration.
///
/// The SAS token is read from `TERRADECK_BLOB_SAS` at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlobConfig {
    /// Storage account name.
    pub account: String,
    /// Container name.
    pub container: String,
    /// Optional key prefix within the container.
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Action executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Which executor to use.
    #[serde(default)]
    pub mode: ExecutorMode,
    /// CI pipeline trigger URL (required for pipeline mode).
    #[serde(default)]
    pub pipeline_url: Option<String>,
    /// Git ref the pipeline runs against.
    #[serde(default = "default_git_ref")]
    pub git_ref: String,
}

/// Executor modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorMode {
    /// Simulated Terraform runs, no external calls.
    #[default]
    Simulate,
    /// Real runs via a CI pipeline trigger.
    Pipeline,
}

fn default_environment() -> String {
    String::from("dev")
}

fn default_git_ref() -> String {
    String::from("main")
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutorMode::default(),
            pipeline_url: None,
            git_ref: default_git_ref(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            environment: default_environment(),
            location: None,
        }
    }
}

impl ExecutorConfig {
    /// Returns true when this configuration needs a pipeline token.
    #[must_use]
    pub const fn needs_token(&self) -> bool {
        matches!(self.mode, ExecutorMode::Pipeline)
    }
}
