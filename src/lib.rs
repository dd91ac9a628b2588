// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Terradeck
//!
//! A deployment inventory and lifecycle manager for Terraform-provisioned
//! Azure resources.
//!
//! ## Overview
//!
//! Terradeck lets platform teams hand out self-service Azure resources
//! without handing out Terraform:
//!
//! - Generate Terraform configurations for a curated set of resource types
//! - Track every deployment in a durable JSON inventory
//! - Run provision, update and decommission actions as asynchronous jobs
//! - Keep an append-only audit trail of every action taken
//!
//! ## Architecture
//!
//! The system is built around a single source of truth, the **inventory**:
//!
//! 1. **Lifecycle tracker**: validates requests against the per-deployment
//!    state machine and commits the pre-state
//! 2. **Job runner**: executes the action asynchronously, streaming logs,
//!    and writes the terminal status back
//! 3. **Inventory store**: serializes every read-modify-write and persists
//!    to local disk, optionally mirrored to Azure Blob Storage
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`inventory`]: Inventory document, storage backends and the store
//! - [`lifecycle`]: Lifecycle tracker and configuration diffing
//! - [`runner`]: Asynchronous job runner and action executors
//! - [`terraform`]: Resource schemas and HCL rendering
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! project:
//!   name: platform-web
//!   environment: prod
//!
//! inventory:
//!   blob:
//!     account: terradeckstate
//!     container: inventory
//!
//! executor:
//!   mode: pipeline
//!   pipeline_url: https://ci.example.com/api/v4/projects/7/trigger/pipeline
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod runner;
pub mod terraform;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, PortalConfig};
pub use error::{Result, TerradeckError};
pub use inventory::{
    Deployment, DeploymentStatus, InventoryDocument, InventoryStore, LifecycleAction,
    ResourceType,
};
pub use lifecycle::{ActionReceipt, ConfigDiff, LifecycleTracker, ProvisionRequest};
pub use runner::{ActionExecutor, JobRunner, PipelineExecutor, SimulatedExecutor};
