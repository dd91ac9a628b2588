//! The deployment lifecycle tracker.
//!
//! Validates requested transitions against the per-deployment state
//! machine, commits the pre-state to the inventory, and hands off to the
//! job runner. Validation and state-guard failures are returned
//! synchronously and never start a job.
//!
//! ```text
//! (none) --provision--> provisioning --[ok]--> deployed
//! provisioning --[err]--> failed
//! deployed --update--> updating --[ok]--> deployed
//!                                --[err]--> update-failed
//! deployed --decommission--> decommissioning --[ok]--> decommissioned
//! decommissioning, decommissioned --(any)--> rejected
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::{LifecycleError, Result, TerradeckError};
use crate::inventory::{
    ChangeEntry, Deployment, DeploymentStatus, InventoryDocument, InventoryStore, LifecycleAction,
    LogLine, ResourceType,
};
use crate::runner::{ActionExecutor, JobRunner};
use crate::terraform;

use super::diff::ConfigDiff;

/// Tag value identifying portal-managed resources.
pub const MANAGED_BY: &str = "terradeck";

/// A provision request.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    /// Which resource type to create.
    pub resource_type: ResourceType,
    /// Configuration field values.
    pub config: BTreeMap<String, String>,
    /// Change ticket reference.
    pub ticket: String,
    /// Target environment (dev, staging, prod, ...).
    pub environment: String,
    /// Project default Azure location, applied when the configuration
    /// omits `location`.
    pub location: Option<String>,
    /// Custom tags, merged under the mandatory portal tags.
    pub tags: BTreeMap<String, String>,
    /// Who requested the action.
    pub requested_by: String,
}

/// Synchronous acknowledgment for a started lifecycle action.
///
/// The action itself proceeds asynchronously; `job` completes when the
/// runner has written the terminal status.
#[derive(Debug)]
pub struct ActionReceipt {
    /// The deployment acted on.
    pub deployment_id: String,
    /// The status committed before the job started.
    pub status: DeploymentStatus,
    /// Handle on the asynchronous job.
    pub job: JoinHandle<()>,
}

/// Point-in-time view for the status polling contract.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DeploymentPoll {
    /// The deployment id.
    pub deployment_id: String,
    /// Current status.
    pub status: DeploymentStatus,
    /// Executor log lines so far.
    pub logs: Vec<LogLine>,
    /// Outputs, if the deployment has completed an apply.
    pub outputs: BTreeMap<String, String>,
}

/// Validates and dispatches lifecycle actions.
pub struct LifecycleTracker {
    /// The inventory store.
    store: Arc<InventoryStore>,
    /// The action delegate handed to spawned jobs.
    executor: Arc<dyn ActionExecutor>,
}

impl LifecycleTracker {
    /// Creates a tracker over a store and an executor.
    #[must_use]
    pub fn new(store: Arc<InventoryStore>, executor: Arc<dyn ActionExecutor>) -> Self {
        Self { store, executor }
    }

    /// Provisions a new deployment.
    ///
    /// Creates the record in `provisioning` status with the mandatory
    /// tags and the initial change history entry, persists, then hands
    /// off to the job runner.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if the ticket or configuration is
    /// missing, or the configuration fails the resource schema.
    pub async fn provision(&self, mut request: ProvisionRequest) -> Result<ActionReceipt> {
        if request.ticket.trim().is_empty() {
            return Err(LifecycleError::validation("A change ticket is required", "ticket").into());
        }
        if request.config.is_empty() {
            return Err(
                LifecycleError::validation("A resource configuration is required", "config").into(),
            );
        }
        if let Err((field, message)) =
            terraform::validate_config(request.resource_type, &request.config)
        {
            return Err(LifecycleError::validation(message, field).into());
        }

        // The project location is a default; an operator-supplied value wins.
        if let Some(location) = request.location.take() {
            request
                .config
                .entry("location".to_string())
                .or_insert(location);
        }

        let mut deployment = Deployment::new(request.resource_type, request.config.clone());
        deployment.tags = mandatory_tags(&deployment, &request);
        deployment.record_change(ChangeEntry::new(
            LifecycleAction::Provision,
            &request.requested_by,
            &request.ticket,
            None,
        ));

        let deployment_id = deployment.id.clone();
        info!(
            "Provisioning {} '{}' as deployment {deployment_id}",
            request.resource_type,
            deployment.name()
        );

        self.store
            .mutate(|doc| {
                doc.push_deployment(deployment.clone());
                Ok(())
            })
            .await?;

        Ok(self.dispatch(deployment_id, LifecycleAction::Provision, request.requested_by))
    }

    /// Applies a configuration update to a deployed resource.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `InvalidState` unless the
    /// deployment is currently `deployed`, `Validation` when the diff
    /// touches an immutable field, and `NoChange` when the proposed
    /// configuration is identical.
    pub async fn update(
        &self,
        deployment_id: &str,
        config: BTreeMap<String, String>,
        ticket: &str,
        tags: BTreeMap<String, String>,
        requested_by: &str,
    ) -> Result<ActionReceipt> {
        if ticket.trim().is_empty() {
            return Err(LifecycleError::validation("A change ticket is required", "ticket").into());
        }

        let id = deployment_id.to_string();
        let ticket = ticket.to_string();
        let actor = requested_by.to_string();
        let diff = self
            .store
            .mutate(move |doc| {
                let deployment = doc
                    .deployment_mut(&id)
                    .ok_or_else(|| TerradeckError::from(LifecycleError::not_found(&id)))?;

                if !deployment.status.can_update() {
                    return Err(LifecycleError::InvalidState {
                        id: id.clone(),
                        status: deployment.status.to_string(),
                        action: LifecycleAction::Update.to_string(),
                    }
                    .into());
                }

                let diff = ConfigDiff::between(&deployment.config, &config);
                if diff.is_empty() {
                    return Err(LifecycleError::NoChange { id: id.clone() }.into());
                }

                let violations = terraform::immutable_violations(deployment.resource_type, &diff);
                if !violations.is_empty() {
                    return Err(LifecycleError::validation(
                        format!(
                            "Cannot change immutable field(s): {}",
                            violations.join(", ")
                        ),
                        violations[0],
                    )
                    .into());
                }

                deployment.config = config;
                for (key, value) in tags {
                    deployment.tags.insert(key, value);
                }
                deployment.tags.insert("ticket".to_string(), ticket.clone());
                deployment.set_status(DeploymentStatus::Updating);
                deployment.record_change(ChangeEntry::new(
                    LifecycleAction::Update,
                    &actor,
                    &ticket,
                    Some(diff.clone()),
                ));
                Ok(diff)
            })
            .await?;

        info!(
            "Updating deployment {deployment_id}: {} field(s) changed",
            diff.len()
        );

        Ok(self.dispatch(
            deployment_id.to_string(),
            LifecycleAction::Update,
            requested_by.to_string(),
        ))
    }

    /// Decommissions a deployment.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id, `AlreadyInProgress` when the
    /// deployment is decommissioning or decommissioned.
    pub async fn decommission(
        &self,
        deployment_id: &str,
        ticket: &str,
        requested_by: &str,
        reason: &str,
    ) -> Result<ActionReceipt> {
        let id = deployment_id.to_string();
        let ticket = ticket.to_string();
        let actor = requested_by.to_string();
        let reason = reason.to_string();
        self.store
            .mutate(move |doc| {
                let deployment = doc
                    .deployment_mut(&id)
                    .ok_or_else(|| TerradeckError::from(LifecycleError::not_found(&id)))?;

                if deployment.status.is_terminal_decommission() {
                    return Err(LifecycleError::AlreadyInProgress {
                        id: id.clone(),
                        status: deployment.status.to_string(),
                    }
                    .into());
                }

                deployment.set_status(DeploymentStatus::Decommissioning);
                deployment.record_change(ChangeEntry::decommission(&actor, &ticket, &reason));
                Ok(())
            })
            .await?;

        info!("Decommissioning deployment {deployment_id}");

        Ok(self.dispatch(
            deployment_id.to_string(),
            LifecycleAction::Decommission,
            requested_by.to_string(),
        ))
    }

    /// Previews the diff an update with `proposed` would apply.
    ///
    /// Pure read: no state is mutated. Missing old values are shown with
    /// the `"(not set)"` sentinel.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub async fn plan(
        &self,
        deployment_id: &str,
        proposed: &BTreeMap<String, String>,
    ) -> Result<ConfigDiff> {
        let doc = self.store.read().await;
        let deployment = doc
            .deployment(deployment_id)
            .ok_or_else(|| TerradeckError::from(LifecycleError::not_found(deployment_id)))?;
        Ok(ConfigDiff::preview(&deployment.config, proposed))
    }

    /// Returns a copy of the full inventory document.
    pub async fn inventory(&self) -> InventoryDocument {
        self.store.read().await
    }

    /// Returns a single deployment by id.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub async fn deployment(&self, deployment_id: &str) -> Result<Deployment> {
        self.store
            .read()
            .await
            .deployment(deployment_id)
            .cloned()
            .ok_or_else(|| TerradeckError::from(LifecycleError::not_found(deployment_id)))
    }

    /// Returns the status/logs/outputs view used by pollers.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub async fn poll(&self, deployment_id: &str) -> Result<DeploymentPoll> {
        let deployment = self.deployment(deployment_id).await?;
        Ok(DeploymentPoll {
            deployment_id: deployment.id,
            status: deployment.status,
            logs: deployment.logs,
            outputs: deployment.outputs,
        })
    }

    /// Spawns the asynchronous job and assembles the receipt.
    fn dispatch(
        &self,
        deployment_id: String,
        action: LifecycleAction,
        actor: String,
    ) -> ActionReceipt {
        let runner = JobRunner::new(self.store.clone(), self.executor.clone());
        let id = deployment_id.clone();
        let job = tokio::spawn(async move {
            runner.run(&id, action, &actor).await;
        });

        let status = match action {
            LifecycleAction::Provision => DeploymentStatus::Provisioning,
            LifecycleAction::Update => DeploymentStatus::Updating,
            LifecycleAction::Decommission => DeploymentStatus::Decommissioning,
        };

        ActionReceipt {
            deployment_id,
            status,
            job,
        }
    }
}

/// Builds the mandatory portal tags, layered over the custom tags.
fn mandatory_tags(deployment: &Deployment, request: &ProvisionRequest) -> BTreeMap<String, String> {
    let mut tags = request.tags.clone();
    tags.insert("ticket".to_string(), request.ticket.clone());
    tags.insert("environment".to_string(), request.environment.clone());
    tags.insert("managed_by".to_string(), MANAGED_BY.to_string());
    tags.insert("deployment_id".to_string(), deployment.id.clone());
    tags.insert(
        "created_at".to_string(),
        deployment.created_at.to_rfc3339(),
    );
    tags
}
