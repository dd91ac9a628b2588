//! Inventory types for tracking deployments and their audit history.
//!
//! These types form the single source of truth for resource status:
//! the inventory document owns every deployment record and the
//! append-only, newest-first audit history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::lifecycle::ConfigDiff;

/// Current version of the inventory document format.
pub const INVENTORY_VERSION: &str = "1.0";

/// The closed set of Azure resource types the portal can provision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Virtual machine.
    Vm,
    /// Storage account.
    Storage,
    /// AKS managed Kubernetes cluster.
    Aks,
    /// Azure SQL server.
    Sql,
    /// Key Vault.
    Keyvault,
    /// Virtual network.
    Vnet,
}

/// Lifecycle status of a deployment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentStatus {
    /// Initial provisioning in progress.
    Provisioning,
    /// Resource is deployed and healthy.
    Deployed,
    /// Configuration update in progress.
    Updating,
    /// The last update failed; previous outputs are preserved.
    UpdateFailed,
    /// Decommission in progress.
    Decommissioning,
    /// Resource was decommissioned; record kept for audit.
    Decommissioned,
    /// Initial provisioning failed.
    Failed,
}

/// Lifecycle actions a deployment can go through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    /// Create a new resource.
    Provision,
    /// Apply a configuration change to a deployed resource.
    Update,
    /// Destroy the resource.
    Decommission,
}

/// Outcome recorded in an audit entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditResult {
    /// The action completed successfully.
    Success,
    /// The action failed.
    Failure,
}

/// A single timestamped log line emitted by an action executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogLine {
    /// When the line was emitted.
    pub timestamp: DateTime<Utc>,
    /// The log message.
    pub message: String,
}

/// One entry in a deployment's change history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Which lifecycle action produced this entry.
    pub action: LifecycleAction,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Who requested the action.
    pub actor: String,
    /// Change ticket reference.
    pub ticket: String,
    /// Configuration diff, for updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<ConfigDiff>,
    /// Free-form reason, for decommissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One tracked resource lifecycle, from provision through optional
/// update(s) to optional decommission. Never deleted from the inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Unique, immutable, generator-assigned identifier.
    pub id: String,
    /// Resource type; immutable after creation.
    pub resource_type: ResourceType,
    /// Configuration field values.
    pub config: BTreeMap<String, String>,
    /// Current lifecycle status.
    pub status: DeploymentStatus,
    /// Tags, including the mandatory portal keys plus custom entries.
    pub tags: BTreeMap<String, String>,
    /// Ordered executor log lines; replaced wholesale on each flush.
    #[serde(default)]
    pub logs: Vec<LogLine>,
    /// Append-only per-deployment change history.
    #[serde(default)]
    pub change_history: Vec<ChangeEntry>,
    /// Terraform outputs recorded on successful completion.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    /// When the deployment was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last touched.
    pub updated_at: DateTime<Utc>,
    /// When the last update action completed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<DateTime<Utc>>,
    /// When the deployment was decommissioned, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decommissioned_at: Option<DateTime<Utc>>,
}

/// One entry in the global audit history. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique, generator-assigned identifier.
    pub id: String,
    /// The deployment this entry concerns.
    pub deployment_id: String,
    /// Which lifecycle action was performed.
    pub action: LifecycleAction,
    /// Who requested the action.
    pub actor: String,
    /// Structured description of what changed.
    pub changes: serde_json::Value,
    /// Whether the action succeeded.
    pub result: AuditResult,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
}

/// The complete inventory: every deployment plus the audit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryDocument {
    /// Document format version.
    pub version: String,
    /// All tracked deployments, including decommissioned ones.
    pub resources: Vec<Deployment>,
    /// Audit history, newest-first by insertion.
    pub history: Vec<AuditEntry>,
}

impl ResourceType {
    /// All resource types, in display order.
    pub const ALL: [Self; 6] = [
        Self::Vm,
        Self::Storage,
        Self::Aks,
        Self::Sql,
        Self::Keyvault,
        Self::Vnet,
    ];
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vm" => Ok(Self::Vm),
            "storage" => Ok(Self::Storage),
            "aks" => Ok(Self::Aks),
            "sql" => Ok(Self::Sql),
            "keyvault" => Ok(Self::Keyvault),
            "vnet" => Ok(Self::Vnet),
            other => Err(format!(
                "Unknown resource type: {other}. Expected: vm, storage, aks, sql, keyvault, or vnet"
            )),
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Vm => "vm",
            Self::Storage => "storage",
            Self::Aks => "aks",
            Self::Sql => "sql",
            Self::Keyvault => "keyvault",
            Self::Vnet => "vnet",
        };
        write!(f, "{s}")
    }
}

impl DeploymentStatus {
    /// Whether an update request is legal from this status.
    #[must_use]
    pub const fn can_update(self) -> bool {
        matches!(self, Self::Deployed)
    }

    /// Whether the deployment is already heading toward, or has reached,
    /// decommission. Decommissioned deployments can never transition again.
    #[must_use]
    pub const fn is_terminal_decommission(self) -> bool {
        matches!(self, Self::Decommissioning | Self::Decommissioned)
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            Self::Provisioning => "provisioning",
            Self::Deployed => "deployed",
            Self::Updating => "updating",
            Self::UpdateFailed => "update-failed",
            Self::Decommissioning => "decommissioning",
            Self::Decommissioned => "decommissioned",
            Self::Failed => "failed",
        };
        write!(f, "{status}")
    }
}

impl LifecycleAction {
    /// Terminal success status for this action.
    #[must_use]
    pub const fn success_status(self) -> DeploymentStatus {
        match self {
            Self::Provision | Self::Update => DeploymentStatus::Deployed,
            Self::Decommission => DeploymentStatus::Decommissioned,
        }
    }

    /// Terminal failure status for this action.
    ///
    /// Decommission has no distinct failure status: the reference portal
    /// applies the success path regardless of the destroy outcome, so a
    /// failed decommission still lands on `Decommissioned` and only the
    /// audit entry records the failure.
    #[must_use]
    pub const fn failure_status(self) -> DeploymentStatus {
        match self {
            Self::Provision => DeploymentStatus::Failed,
            Self::Update => DeploymentStatus::UpdateFailed,
            Self::Decommission => DeploymentStatus::Decommissioned,
        }
    }
}

impl std::fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let action = match self {
            Self::Provision => "provision",
            Self::Update => "update",
            Self::Decommission => "decommission",
        };
        write!(f, "{action}")
    }
}

impl std::fmt::Display for AuditResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

impl LogLine {
    /// Creates a log line stamped with the current time.
    #[must_use]
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}  {}", self.timestamp.to_rfc3339(), self.message)
    }
}

impl Deployment {
    /// Creates a new deployment in `Provisioning` status with a fresh id.
    #[must_use]
    pub fn new(resource_type: ResourceType, config: BTreeMap<String, String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            resource_type,
            config,
            status: DeploymentStatus::Provisioning,
            tags: BTreeMap::new(),
            logs: Vec::new(),
            change_history: Vec::new(),
            outputs: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            last_updated_at: None,
            decommissioned_at: None,
        }
    }

    /// Resource name from config, falling back to the deployment id.
    #[must_use]
    pub fn name(&self) -> &str {
        self.config.get("name").map_or(self.id.as_str(), String::as_str)
    }

    /// Updates the status and touches `updated_at`.
    pub fn set_status(&mut self, status: DeploymentStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Appends a change history entry and touches `updated_at`.
    pub fn record_change(&mut self, entry: ChangeEntry) {
        self.change_history.push(entry);
        self.updated_at = Utc::now();
    }
}

impl ChangeEntry {
    /// Creates an entry for a provision or update action.
    #[must_use]
    pub fn new(action: LifecycleAction, actor: &str, ticket: &str, diff: Option<ConfigDiff>) -> Self {
        Self {
            action,
            timestamp: Utc::now(),
            actor: actor.to_string(),
            ticket: ticket.to_string(),
            diff,
            reason: None,
        }
    }

    /// Creates an entry for a decommission action with its reason.
    #[must_use]
    pub fn decommission(actor: &str, ticket: &str, reason: &str) -> Self {
        Self {
            action: LifecycleAction::Decommission,
            timestamp: Utc::now(),
            actor: actor.to_string(),
            ticket: ticket.to_string(),
            diff: None,
            reason: Some(reason.to_string()),
        }
    }
}

impl InventoryDocument {
    /// Creates a new empty inventory document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: INVENTORY_VERSION.to_string(),
            resources: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Gets a deployment by id.
    #[must_use]
    pub fn deployment(&self, id: &str) -> Option<&Deployment> {
        self.resources.iter().find(|d| d.id == id)
    }

    /// Gets a mutable reference to a deployment by id.
    pub fn deployment_mut(&mut self, id: &str) -> Option<&mut Deployment> {
        self.resources.iter_mut().find(|d| d.id == id)
    }

    /// Adds a new deployment record.
    pub fn push_deployment(&mut self, deployment: Deployment) {
        self.resources.push(deployment);
    }

    /// Inserts an audit entry at the head of the history with a fresh id
    /// and the current timestamp, and returns a reference to it.
    pub fn record_audit(
        &mut self,
        deployment_id: &str,
        action: LifecycleAction,
        actor: &str,
        changes: serde_json::Value,
        result: AuditResult,
    ) -> &AuditEntry {
        let entry = AuditEntry {
            id: Uuid::new_v4().to_string(),
            deployment_id: deployment_id.to_string(),
            action,
            actor: actor.to_string(),
            changes,
            result,
            timestamp: Utc::now(),
        };
        self.history.insert(0, entry);
        &self.history[0]
    }

    /// Audit entries concerning a single deployment, newest-first.
    #[must_use]
    pub fn history_for(&self, deployment_id: &str) -> Vec<&AuditEntry> {
        self.history
            .iter()
            .filter(|e| e.deployment_id == deployment_id)
            .collect()
    }

    /// Deployments that are not decommissioned.
    #[must_use]
    pub fn active_deployments(&self) -> Vec<&Deployment> {
        self.resources
            .iter()
            .filter(|d| d.status != DeploymentStatus::Decommissioned)
            .collect()
    }
}

impl Default for InventoryDocument {
    fn default() -> Self {
        Self::new()
    }
}
