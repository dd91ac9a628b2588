//! Configuration parser for loading the portal configuration.
//!
//! This module handles loading configuration from YAML files and
//! environment variables, with proper precedence and error handling.

use crate::error::{ConfigError, Result, TerradeckError};
use std::path::Path;
use tracing::{debug, info};

use super::spec::PortalConfig;

/// Environment variable carrying the Azure Blob SAS token.
pub const BLOB_SAS_VAR: &str = "TERRADECK_BLOB_SAS";

/// Environment variable carrying the CI pipeline trigger token.
pub const PIPELINE_TOKEN_VAR: &str = "TERRADECK_PIPELINE_TOKEN";

/// Configuration parser for loading the portal configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<std::path::PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<PortalConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(TerradeckError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            TerradeckError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<PortalConfig> {
        debug!("Parsing YAML configuration");

        let config: PortalConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            TerradeckError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Successfully parsed configuration for project: {}", config.project.name);
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Environment variables are checked in the format
    /// `TERRADECK_<SECTION>_<KEY>` (e.g., `TERRADECK_PROJECT_NAME`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<PortalConfig> {
        let mut config = self.load_file(path)?;

        Self::apply_env_overrides(&mut config);

        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(config: &mut PortalConfig) {
        if let Ok(name) = std::env::var("TERRADECK_PROJECT_NAME") {
            debug!("Overriding project.name from environment");
            config.project.name = name;
        }

        if let Ok(env) = std::env::var("TERRADECK_PROJECT_ENVIRONMENT") {
            debug!("Overriding project.environment from environment");
            config.project.environment = env;
        }

        if let Ok(path) = std::env::var("TERRADECK_INVENTORY_PATH") {
            debug!("Overriding inventory.path from environment");
            config.inventory.path = Some(path);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| std::path::PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                TerradeckError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Validates that the environment carries the secrets the
    /// configuration needs.
    ///
    /// # Errors
    ///
    /// Returns an error if a required environment variable is missing.
    pub fn validate_required_env(config: &PortalConfig) -> Result<()> {
        if config.inventory.blob.is_some() && std::env::var(BLOB_SAS_VAR).is_err() {
            return Err(TerradeckError::Config(ConfigError::MissingEnvVar {
                name: BLOB_SAS_VAR.to_string(),
            }));
        }

        if config.executor.needs_token() && std::env::var(PIPELINE_TOKEN_VAR).is_err() {
            return Err(TerradeckError::Config(ConfigError::MissingEnvVar {
                name: PIPELINE_TOKEN_VAR.to_string(),
            }));
        }

        Ok(())
    }

    /// Gets the Azure Blob SAS token from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not set.
    pub fn get_blob_sas() -> Result<String> {
        std::env::var(BLOB_SAS_VAR).map_err(|_| {
            TerradeckError::Config(ConfigError::MissingEnvVar {
                name: BLOB_SAS_VAR.to_string(),
            })
        })
    }

    /// Gets the CI pipeline trigger token from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not set.
    pub fn get_pipeline_token() -> Result<String> {
        std::env::var(PIPELINE_TOKEN_VAR).map_err(|_| {
            TerradeckError::Config(ConfigError::MissingEnvVar {
                name: PIPELINE_TOKEN_VAR.to_string(),
            })
        })
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["terradeck.yaml", "terradeck.yml"];

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(TerradeckError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::spec::ExecutorMode;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r"
project:
  name: platform-web
";
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).unwrap();
        assert_eq!(config.project.name, "platform-web");
        assert_eq!(config.project.environment, "dev");
        assert_eq!(config.executor.mode, ExecutorMode::Simulate);
        assert!(config.inventory.blob.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r"
project:
  name: platform-web
  environment: prod
  location: westeurope

inventory:
  path: state/inventory.json
  blob:
    account: terradeckstate
    container: inventory
    prefix: platform-web/prod

executor:
  mode: pipeline
  pipeline_url: https://ci.example.com/api/v4/projects/7/trigger/pipeline
  git_ref: release
";
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).unwrap();
        assert_eq!(config.project.environment, "prod");
        let blob = config.inventory.blob.unwrap();
        assert_eq!(blob.account, "terradeckstate");
        assert_eq!(blob.prefix.as_deref(), Some("platform-web/prod"));
        assert_eq!(config.executor.mode, ExecutorMode::Pipeline);
        assert_eq!(config.executor.git_ref, "release");
    }

    #[test]
    fn test_parse_invalid_yaml_reports_location() {
        let parser = ConfigParser::new();
        let result = parser.parse_yaml("project: [broken", None);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let parser = ConfigParser::new();
        let result = parser.load_file("/nonexistent/terradeck.yaml");
        assert!(matches!(
            result,
            Err(TerradeckError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
