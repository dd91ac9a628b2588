//! Configuration module for the Terradeck portal.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `terradeck.yaml`
//! - Environment variable overrides and secrets
//! - Validation of configuration values

mod spec;
mod parser;
mod validator;

pub use spec::{
    BlobConfig, ExecutorConfig, ExecutorMode, InventoryConfig, PortalConfig, ProjectConfig,
};
pub use parser::{find_config_file, ConfigParser, BLOB_SAS_VAR, PIPELINE_TOKEN_VAR};
pub use validator::{ConfigValidator, ValidationResult};
