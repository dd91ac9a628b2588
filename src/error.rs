//! Error types for the Terradeck deployment system.
//!
//! This module provides the error hierarchy for all operations in the
//! deployment lifecycle: configuration, inventory storage, lifecycle
//! transitions, and asynchronous action execution.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Terradeck deployment system.
#[derive(Debug, Error)]
pub enum TerradeckError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Inventory storage errors.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Lifecycle transition errors.
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Action executor errors.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Inventory storage errors.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Inventory document is corrupted.
    #[error("Inventory is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Serialization error.
    #[error("Inventory serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// Azure Blob backend error.
    #[error("Blob storage backend error: {message}")]
    BlobError {
        /// Description of the blob error.
        message: String,
    },

    /// Generic backend error.
    #[error("Storage backend error: {message}")]
    BackendError {
        /// Description of the backend error.
        message: String,
    },
}

/// Lifecycle transition errors.
///
/// These are surfaced synchronously to the caller of a lifecycle operation
/// and never start an asynchronous job.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A required input is missing or invalid.
    #[error("Validation failed: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
        /// Field that failed validation, if any.
        field: Option<String>,
    },

    /// The deployment id is unknown.
    #[error("Deployment not found: {id}")]
    NotFound {
        /// The unknown deployment id.
        id: String,
    },

    /// The requested action is illegal for the deployment's current status.
    #[error("Deployment {id} is in status '{status}', cannot {action}")]
    InvalidState {
        /// The deployment id.
        id: String,
        /// The deployment's current status.
        status: String,
        /// The rejected action.
        action: String,
    },

    /// An update request produced an empty diff.
    #[error("Deployment {id}: proposed configuration is identical, nothing to update")]
    NoChange {
        /// The deployment id.
        id: String,
    },

    /// A decommission was requested for a deployment already heading that way.
    #[error("Deployment {id} is already {status}")]
    AlreadyInProgress {
        /// The deployment id.
        id: String,
        /// The deployment's current status.
        status: String,
    },
}

/// Action executor errors.
///
/// Raised only inside the asynchronous job runner; recorded into the
/// deployment's logs, status, and the audit history rather than propagated
/// to the caller that started the action.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The simulated Terraform run failed.
    #[error("Simulated run failed: {message}")]
    Simulated {
        /// Description of the failure.
        message: String,
    },

    /// The CI pipeline trigger failed.
    #[error("Pipeline trigger failed: {status} - {message}")]
    PipelineFailed {
        /// HTTP status code from the pipeline endpoint.
        status: u16,
        /// Error message from the endpoint.
        message: String,
    },

    /// Network error reaching the pipeline endpoint.
    #[error("Network error communicating with pipeline: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },
}

/// Result type alias for Terradeck operations.
pub type Result<T> = std::result::Result<T, TerradeckError>;

impl TerradeckError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl InventoryError {
    /// Creates a blob backend error with the given message.
    #[must_use]
    pub fn blob(message: impl Into<String>) -> Self {
        Self::BlobError {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Creates a generic backend error with the given message.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::BackendError {
            message: message.into(),
        }
    }
}

impl LifecycleError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a not-found error for the given deployment id.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
}

impl ExecutionError {
    /// Creates a pipeline failure error.
    #[must_use]
    pub fn pipeline(status: u16, message: impl Into<String>) -> Self {
        Self::PipelineFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }
}
