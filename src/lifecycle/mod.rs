//! Deployment lifecycle management.
//!
//! The tracker turns validated requests into committed pre-states and
//! asynchronous jobs; the diff engine computes the field-level changes
//! an update would apply.

pub mod diff;
pub mod tracker;

pub use diff::{ConfigDiff, FieldChange, NOT_SET};
pub use tracker::{
    ActionReceipt, DeploymentPoll, LifecycleTracker, ProvisionRequest, MANAGED_BY,
};
