//! Configuration validation for the portal configuration.
//!
//! Checks the parsed configuration for values that would only fail
//! later, at provision time or against the blob mirror.

use crate::error::{ConfigError, Result, TerradeckError};
use tracing::debug;

use super::spec::{ExecutorMode, PortalConfig};

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

/// Validator for portal configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a portal configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self, config: &PortalConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_project(config, &mut result);
        Self::validate_inventory(config, &mut result);
        Self::validate_executor(config, &mut result);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(TerradeckError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Validates the project section.
    fn validate_project(config: &PortalConfig, result: &mut ValidationResult) {
        let project = &config.project;

        if project.name.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("project.name"),
                message: String::from("Project name cannot be empty"),
            });
        } else if !is_valid_name(&project.name) {
            result.errors.push(ValidationError {
                field: String::from("project.name"),
                message: format!(
                    "Project name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    project.name
                ),
            });
        }

        if project.environment.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("project.environment"),
                message: String::from("Environment cannot be empty"),
            });
        }
    }

    /// Validates the inventory section.
    fn validate_inventory(config: &PortalConfig, result: &mut ValidationResult) {
        if let Some(blob) = &config.inventory.blob {
            if blob.account.is_empty() {
                result.errors.push(ValidationError {
                    field: String::from("inventory.blob.account"),
                    message: String::from("Blob storage account name cannot be empty"),
                });
            }
            if blob.container.is_empty() {
                result.errors.push(ValidationError {
                    field: String::from("inventory.blob.container"),
                    message: String::from("Blob container name cannot be empty"),
                });
            }
        }
    }

    /// Validates the executor section.
    fn validate_executor(config: &PortalConfig, result: &mut ValidationResult) {
        match config.executor.mode {
            ExecutorMode::Pipeline => {
                match config.executor.pipeline_url.as_deref() {
                    None | Some("") => result.errors.push(ValidationError {
                        field: String::from("executor.pipeline_url"),
                        message: String::from(
                            "Pipeline trigger URL is required when using pipeline mode",
                        ),
                    }),
                    Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                        result.errors.push(ValidationError {
                            field: String::from("executor.pipeline_url"),
                            message: format!("Pipeline trigger URL '{url}' must be http(s)"),
                        });
                    }
                    Some(_) => {}
                }

                if config.executor.git_ref.is_empty() {
                    result.errors.push(ValidationError {
                        field: String::from("executor.git_ref"),
                        message: String::from("Git ref cannot be empty"),
                    });
                }
            }
            ExecutorMode::Simulate => {
                if config.project.environment == "prod" {
                    result.warnings.push(String::from(
                        "Simulated executor in a prod environment: no real resources will be created",
                    ));
                }
            }
        }
    }
}

/// Checks whether a name is lowercase alphanumeric with hyphens.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::spec::{BlobConfig, ExecutorConfig, InventoryConfig, ProjectConfig};

    fn base_config() -> PortalConfig {
        PortalConfig {
            project: ProjectConfig {
                name: String::from("platform-web"),
                environment: String::from("dev"),
                location: None,
            },
            inventory: InventoryConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let result = ConfigValidator::new().validate(&base_config());
        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_project_name() {
        let mut config = base_config();
        config.project.name = String::from("Platform Web");
        let result = ConfigValidator::new().validate(&config);
        assert!(result.is_err());
    }

    #[test]
    fn test_pipeline_mode_requires_url() {
        let mut config = base_config();
        config.executor.mode = ExecutorMode::Pipeline;
        let result = ConfigValidator::new().validate(&config);
        assert!(result.is_err());

        config.executor.pipeline_url = Some(String::from("ftp://nope"));
        assert!(ConfigValidator::new().validate(&config).is_err());

        config.executor.pipeline_url = Some(String::from("https://ci.example.com/trigger"));
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }

    #[test]
    fn test_blob_account_required() {
        let mut config = base_config();
        config.inventory.blob = Some(BlobConfig {
            account: String::new(),
            container: String::from("inventory"),
            prefix: None,
        });
        let result = ConfigValidator::new().validate(&config);
        assert!(result.is_err());
    }

    #[test]
    fn test_simulate_in_prod_warns() {
        let mut config = base_config();
        config.project.environment = String::from("prod");
        let result = ConfigValidator::new().validate(&config).unwrap();
        assert_eq!(result.warnings.len(), 1);
    }
}
