//! The job runner: executes a lifecycle action out of band and reflects
//! its outcome into the inventory.
//!
//! `run` is fire-and-forget from the caller's perspective: the caller
//! has already committed the pre-state (status `provisioning`,
//! `updating`, or `decommissioning`) and received its acknowledgment.
//! Every failure inside the runner is caught and recorded into the
//! deployment's logs, status, and the audit history; nothing propagates.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::{Result, TerradeckError};
use crate::inventory::{
    AuditResult, InventoryStore, LifecycleAction, LogLine,
};

use super::executor::{ActionExecutor, ExecutionOutputs, JobContext, LogSink};

/// Buffered log lines are flushed into the inventory every this many
/// lines, and once more at completion.
pub const LOG_FLUSH_EVERY: usize = 5;

/// Executes lifecycle actions asynchronously against the inventory.
pub struct JobRunner {
    /// The inventory store.
    store: Arc<InventoryStore>,
    /// The action delegate.
    executor: Arc<dyn ActionExecutor>,
}

impl JobRunner {
    /// Creates a job runner.
    #[must_use]
    pub fn new(store: Arc<InventoryStore>, executor: Arc<dyn ActionExecutor>) -> Self {
        Self { store, executor }
    }

    /// Runs one lifecycle action to completion.
    ///
    /// Never returns an error: failures are recorded into the deployment
    /// and the audit history.
    pub async fn run(&self, deployment_id: &str, action: LifecycleAction, actor: &str) {
        let Some(ctx) = self.build_context(deployment_id, action).await else {
            error!("Job for unknown deployment {deployment_id}, dropping");
            return;
        };

        info!("Starting {action} job for deployment {deployment_id}");

        let (sink, mut rx) = LogSink::channel();
        let mut buffered: Vec<LogLine> = Vec::new();
        let mut unflushed = 0usize;

        let outcome = {
            let exec = self.executor.execute(&ctx, &sink);
            tokio::pin!(exec);

            loop {
                tokio::select! {
                    biased;
                    maybe_line = rx.recv() => {
                        if let Some(line) = maybe_line {
                            buffered.push(line);
                            unflushed += 1;
                            if unflushed >= LOG_FLUSH_EVERY {
                                unflushed = 0;
                                self.flush_logs(deployment_id, &buffered).await;
                            }
                        }
                    }
                    result = &mut exec => break result,
                }
            }
        };

        // Collect lines emitted between the last flush and completion.
        while let Ok(line) = rx.try_recv() {
            buffered.push(line);
        }
        drop(sink);

        match outcome {
            Ok(outputs) => self.finish_success(&ctx, actor, buffered, outputs).await,
            Err(e) => self.finish_failure(&ctx, actor, buffered, &e).await,
        }
    }

    /// Snapshots the deployment into an execution context.
    async fn build_context(&self, deployment_id: &str, action: LifecycleAction) -> Option<JobContext> {
        let doc = self.store.read().await;
        let deployment = doc.deployment(deployment_id)?;
        Some(JobContext {
            deployment_id: deployment_id.to_string(),
            action,
            resource_type: deployment.resource_type,
            config: deployment.config.clone(),
            tags: deployment.tags.clone(),
        })
    }

    /// Replaces the deployment's logs wholesale with the buffer.
    async fn flush_logs(&self, deployment_id: &str, buffered: &[LogLine]) {
        debug!("Flushing {} log line(s) for {deployment_id}", buffered.len());
        let logs = buffered.to_vec();
        let result: Result<()> = self
            .store
            .mutate(|doc| {
                if let Some(deployment) = doc.deployment_mut(deployment_id) {
                    deployment.logs = logs;
                }
                Ok(())
            })
            .await;
        if let Err(e) = result {
            error!("Failed to flush logs for {deployment_id}: {e}");
        }
    }

    /// Applies the terminal success state and records the audit entry.
    async fn finish_success(
        &self,
        ctx: &JobContext,
        actor: &str,
        logs: Vec<LogLine>,
        outputs: ExecutionOutputs,
    ) {
        let status = ctx.action.success_status();
        info!(
            "Job for {} finished: {} -> {status}",
            ctx.deployment_id, ctx.action
        );

        let action = ctx.action;
        let deployment_id = ctx.deployment_id.clone();
        let result: Result<()> = self
            .store
            .mutate(|doc| {
                let changes = audit_changes(doc, &deployment_id, action);
                if let Some(deployment) = doc.deployment_mut(&deployment_id) {
                    deployment.logs = logs;
                    deployment.set_status(status);
                    if !outputs.outputs.is_empty() {
                        deployment.outputs = outputs.outputs;
                    }
                    match action {
                        LifecycleAction::Provision => {}
                        LifecycleAction::Update => {
                            deployment.last_updated_at = Some(Utc::now());
                        }
                        LifecycleAction::Decommission => {
                            deployment.decommissioned_at = Some(Utc::now());
                        }
                    }
                }
                doc.record_audit(&deployment_id, action, actor, changes, AuditResult::Success);
                Ok(())
            })
            .await;

        if let Err(e) = result {
            error!("Failed to persist success for {}: {e}", ctx.deployment_id);
        }
    }

    /// Applies the terminal failure state and records the audit entry.
    ///
    /// Decommission keeps the reference portal's behavior: the status
    /// still lands on `decommissioned`, and only the audit entry and the
    /// final log line betray the failed destroy.
    async fn finish_failure(
        &self,
        ctx: &JobContext,
        actor: &str,
        mut logs: Vec<LogLine>,
        error: &TerradeckError,
    ) {
        let status = ctx.action.failure_status();
        error!(
            "Job for {} failed during {}: {error}",
            ctx.deployment_id, ctx.action
        );

        logs.push(LogLine::now(format!("Error: {error}")));

        let action = ctx.action;
        let deployment_id = ctx.deployment_id.clone();
        let message = error.to_string();
        let result: Result<()> = self
            .store
            .mutate(|doc| {
                if let Some(deployment) = doc.deployment_mut(&deployment_id) {
                    deployment.logs = logs;
                    deployment.set_status(status);
                    if action == LifecycleAction::Decommission {
                        deployment.decommissioned_at = Some(Utc::now());
                    }
                }
                doc.record_audit(
                    &deployment_id,
                    action,
                    actor,
                    serde_json::json!({ "error": message }),
                    AuditResult::Failure,
                );
                Ok(())
            })
            .await;

        if let Err(e) = result {
            error!("Failed to persist failure for {}: {e}", ctx.deployment_id);
        }
    }
}

/// Builds the audit `changes` payload from the deployment's most recent
/// change history entry.
fn audit_changes(
    doc: &crate::inventory::InventoryDocument,
    deployment_id: &str,
    action: LifecycleAction,
) -> serde_json::Value {
    let Some(deployment) = doc.deployment(deployment_id) else {
        return serde_json::Value::Null;
    };
    match action {
        LifecycleAction::Provision => serde_json::json!({ "config": deployment.config }),
        LifecycleAction::Update => deployment
            .change_history
            .last()
            .and_then(|entry| entry.diff.as_ref())
            .map_or(serde_json::Value::Null, |diff| {
                serde_json::to_value(diff).unwrap_or(serde_json::Value::Null)
            }),
        LifecycleAction::Decommission => {
            let reason = deployment
                .change_history
                .last()
                .and_then(|entry| entry.reason.clone());
            serde_json::json!({ "reason": reason })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use crate::inventory::{
        Deployment, DeploymentStatus, LocalBackend, ResourceType,
    };
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    /// Executor that emits scripted lines, then succeeds or fails.
    struct ScriptedExecutor {
        lines: Vec<String>,
        outputs: BTreeMap<String, String>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl ActionExecutor for ScriptedExecutor {
        async fn execute(&self, _ctx: &JobContext, logs: &LogSink) -> Result<ExecutionOutputs> {
            for line in &self.lines {
                logs.emit(line.clone());
            }
            match &self.fail_with {
                Some(message) => Err(TerradeckError::Execution(ExecutionError::Simulated {
                    message: message.clone(),
                })),
                None => Ok(ExecutionOutputs {
                    outputs: self.outputs.clone(),
                }),
            }
        }

        fn executor_type(&self) -> &'static str {
            "scripted"
        }
    }

    async fn store_with_deployment(
        temp: &TempDir,
        status: DeploymentStatus,
    ) -> (Arc<InventoryStore>, String) {
        let backend = LocalBackend::with_path(temp.path().join("inventory.json"));
        let store = Arc::new(
            InventoryStore::open(Box::new(backend))
                .await
                .expect("open store"),
        );
        let mut config = BTreeMap::new();
        config.insert("name".to_string(), "v1".to_string());
        let mut deployment = Deployment::new(ResourceType::Vnet, config);
        deployment.set_status(status);
        let id = deployment.id.clone();
        store
            .mutate(|doc| {
                doc.push_deployment(deployment.clone());
                Ok(())
            })
            .await
            .expect("seed deployment");
        (store, id)
    }

    fn runner(store: &Arc<InventoryStore>, executor: ScriptedExecutor) -> JobRunner {
        JobRunner::new(store.clone(), Arc::new(executor))
    }

    #[tokio::test]
    async fn test_successful_provision_reaches_deployed_with_outputs() {
        let temp = TempDir::new().expect("temp dir");
        let (store, id) = store_with_deployment(&temp, DeploymentStatus::Provisioning).await;

        let mut outputs = BTreeMap::new();
        outputs.insert("resource_id".to_string(), "/subscriptions/x".to_string());
        let runner = runner(
            &store,
            ScriptedExecutor {
                lines: vec!["step 1".to_string(), "step 2".to_string()],
                outputs,
                fail_with: None,
            },
        );

        runner.run(&id, LifecycleAction::Provision, "alex").await;

        let doc = store.read().await;
        let deployment = doc.deployment(&id).expect("deployment");
        assert_eq!(deployment.status, DeploymentStatus::Deployed);
        assert_eq!(
            deployment.outputs.get("resource_id").map(String::as_str),
            Some("/subscriptions/x")
        );
        assert_eq!(deployment.logs.len(), 2);
        assert_eq!(deployment.logs[0].message, "step 1");

        let history = doc.history_for(&id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, LifecycleAction::Provision);
        assert_eq!(history[0].result, AuditResult::Success);
    }

    #[tokio::test]
    async fn test_failed_provision_lands_on_failed_with_error_log() {
        let temp = TempDir::new().expect("temp dir");
        let (store, id) = store_with_deployment(&temp, DeploymentStatus::Provisioning).await;

        let runner = runner(
            &store,
            ScriptedExecutor {
                lines: vec!["initializing".to_string()],
                outputs: BTreeMap::new(),
                fail_with: Some("quota exceeded".to_string()),
            },
        );

        runner.run(&id, LifecycleAction::Provision, "alex").await;

        let doc = store.read().await;
        let deployment = doc.deployment(&id).expect("deployment");
        assert_eq!(deployment.status, DeploymentStatus::Failed);
        let last = deployment.logs.last().expect("error log line");
        assert!(last.message.contains("quota exceeded"));

        let history = doc.history_for(&id);
        assert_eq!(history[0].result, AuditResult::Failure);
    }

    #[tokio::test]
    async fn test_failed_update_preserves_outputs() {
        let temp = TempDir::new().expect("temp dir");
        let (store, id) = store_with_deployment(&temp, DeploymentStatus::Updating).await;
        store
            .mutate(|doc| {
                let deployment = doc.deployment_mut(&id).expect("deployment");
                deployment
                    .outputs
                    .insert("endpoint".to_string(), "10.0.0.0/16".to_string());
                Ok(())
            })
            .await
            .expect("seed outputs");

        let runner = runner(
            &store,
            ScriptedExecutor {
                lines: vec![],
                outputs: BTreeMap::new(),
                fail_with: Some("plan rejected".to_string()),
            },
        );

        runner.run(&id, LifecycleAction::Update, "alex").await;

        let doc = store.read().await;
        let deployment = doc.deployment(&id).expect("deployment");
        assert_eq!(deployment.status, DeploymentStatus::UpdateFailed);
        // The last known good outputs survive a failed update.
        assert_eq!(
            deployment.outputs.get("endpoint").map(String::as_str),
            Some("10.0.0.0/16")
        );
    }

    #[tokio::test]
    async fn test_failed_decommission_still_lands_on_decommissioned() {
        let temp = TempDir::new().expect("temp dir");
        let (store, id) = store_with_deployment(&temp, DeploymentStatus::Decommissioning).await;

        let runner = runner(
            &store,
            ScriptedExecutor {
                lines: vec![],
                outputs: BTreeMap::new(),
                fail_with: Some("destroy failed".to_string()),
            },
        );

        runner.run(&id, LifecycleAction::Decommission, "alex").await;

        let doc = store.read().await;
        let deployment = doc.deployment(&id).expect("deployment");
        // Reference behavior: status does not distinguish the failure.
        assert_eq!(deployment.status, DeploymentStatus::Decommissioned);
        assert!(deployment.decommissioned_at.is_some());
        // The audit trail does.
        assert_eq!(doc.history_for(&id)[0].result, AuditResult::Failure);
    }

    /// Executor that emits its lines up front, then holds until released.
    struct HoldingExecutor {
        lines: usize,
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl ActionExecutor for HoldingExecutor {
        async fn execute(&self, _ctx: &JobContext, logs: &LogSink) -> Result<ExecutionOutputs> {
            for i in 0..self.lines {
                logs.emit(format!("line {i}"));
            }
            self.release.notified().await;
            Ok(ExecutionOutputs::default())
        }

        fn executor_type(&self) -> &'static str {
            "holding"
        }
    }

    #[tokio::test]
    async fn test_flush_makes_logs_visible_before_job_completes() {
        let temp = TempDir::new().expect("temp dir");
        let (store, id) = store_with_deployment(&temp, DeploymentStatus::Provisioning).await;

        let release = Arc::new(tokio::sync::Notify::new());
        let runner = JobRunner::new(
            store.clone(),
            Arc::new(HoldingExecutor {
                lines: LOG_FLUSH_EVERY * 2,
                release: release.clone(),
            }),
        );

        let job_id = id.clone();
        let handle = tokio::spawn(async move {
            runner.run(&job_id, LifecycleAction::Provision, "alex").await;
        });

        // The runner flushes while the executor holds the job open, so
        // the inventory must show log lines before any terminal status.
        let mut flushed = 0;
        for _ in 0..200 {
            let doc = store.read().await;
            let deployment = doc.deployment(&id).expect("deployment");
            if !deployment.logs.is_empty() {
                flushed = deployment.logs.len();
                assert_eq!(deployment.status, DeploymentStatus::Provisioning);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(flushed >= LOG_FLUSH_EVERY, "no flush observed mid-job");

        release.notify_one();
        handle.await.expect("job");

        let doc = store.read().await;
        let deployment = doc.deployment(&id).expect("deployment");
        assert_eq!(deployment.status, DeploymentStatus::Deployed);
        assert_eq!(deployment.logs.len(), LOG_FLUSH_EVERY * 2);
    }

    #[tokio::test]
    async fn test_logs_preserve_emission_order() {
        let temp = TempDir::new().expect("temp dir");
        let (store, id) = store_with_deployment(&temp, DeploymentStatus::Provisioning).await;

        let lines: Vec<String> = (0..12).map(|i| format!("line {i}")).collect();
        let runner = runner(
            &store,
            ScriptedExecutor {
                lines: lines.clone(),
                outputs: BTreeMap::new(),
                fail_with: None,
            },
        );

        runner.run(&id, LifecycleAction::Provision, "alex").await;

        let doc = store.read().await;
        let deployment = doc.deployment(&id).expect("deployment");
        let messages: Vec<&str> = deployment.logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, lines.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_unknown_deployment_is_dropped_silently() {
        let temp = TempDir::new().expect("temp dir");
        let (store, _id) = store_with_deployment(&temp, DeploymentStatus::Provisioning).await;

        let runner = runner(
            &store,
            ScriptedExecutor {
                lines: vec![],
                outputs: BTreeMap::new(),
                fail_with: None,
            },
        );

        // Must not panic or record anything.
        runner.run("no-such-id", LifecycleAction::Provision, "alex").await;
        assert!(store.read().await.history.is_empty());
    }
}
