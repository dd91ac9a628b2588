//! Action executors: the delegates that actually carry out a lifecycle
//! action.
//!
//! Two implementations are provided: a local simulated Terraform run for
//! development and demos, and a CI pipeline trigger for real
//! environments. Both stream log lines through a [`LogSink`] and return
//! outputs on success.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{ExecutionError, Result, TerradeckError};
use crate::inventory::{LifecycleAction, LogLine, ResourceType};
use crate::terraform;

/// Context handed to an executor for one lifecycle action.
#[derive(Debug, Clone)]
pub struct JobContext {
    /// The deployment being acted on.
    pub deployment_id: String,
    /// The lifecycle action to perform.
    pub action: LifecycleAction,
    /// The deployment's resource type.
    pub resource_type: ResourceType,
    /// The configuration to apply (current config for decommission).
    pub config: BTreeMap<String, String>,
    /// The deployment's tags.
    pub tags: BTreeMap<String, String>,
}

/// Outputs produced by a successful execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutputs {
    /// Terraform-style output values.
    pub outputs: BTreeMap<String, String>,
}

/// Handle executors use to emit timestamped log lines.
#[derive(Debug, Clone)]
pub struct LogSink {
    /// Channel into the job runner's buffer.
    tx: mpsc::UnboundedSender<LogLine>,
}

impl LogSink {
    /// Creates a sink and the receiving half for the job runner.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LogLine>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emits a log line stamped with the current time.
    ///
    /// Lines emitted after the runner has gone away are dropped silently.
    pub fn emit(&self, message: impl Into<String>) {
        let _ = self.tx.send(LogLine::now(message));
    }
}

/// Trait for lifecycle action delegates.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Executes the action, streaming log lines into `logs`.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutionError`] wrapped in [`TerradeckError`] if the
    /// action fails. The job runner catches every error; nothing
    /// propagates to the caller that started the action.
    async fn execute(&self, ctx: &JobContext, logs: &LogSink) -> Result<ExecutionOutputs>;

    /// Gets the executor type name.
    fn executor_type(&self) -> &'static str;
}

/// Locally simulated Terraform execution.
///
/// Renders the real template, then walks through apply/destroy-style log
/// lines with a pseudo-random per-deployment delay derived from the
/// deployment id, and fabricates plausible outputs.
#[derive(Debug)]
pub struct SimulatedExecutor {
    /// Fixed delay between log steps; `None` derives one from the
    /// deployment id.
    step_delay: Option<Duration>,
}

impl SimulatedExecutor {
    /// Creates a simulated executor with id-derived step delays.
    #[must_use]
    pub const fn new() -> Self {
        Self { step_delay: None }
    }

    /// Fixes the delay between simulated steps. Tests use
    /// `Duration::ZERO`.
    #[must_use]
    pub const fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = Some(delay);
        self
    }

    /// Per-step delay: fixed if configured, otherwise 50-250ms derived
    /// deterministically from the deployment id.
    fn step_delay_for(&self, deployment_id: &str) -> Duration {
        self.step_delay.unwrap_or_else(|| {
            let digest = Sha256::digest(deployment_id.as_bytes());
            let millis = 50 + u64::from(digest[0]) % 200;
            Duration::from_millis(millis)
        })
    }

    /// Fabricates outputs for a provisioned resource.
    fn fake_outputs(ctx: &JobContext) -> BTreeMap<String, String> {
        let name = ctx.config.get("name").map_or("unnamed", String::as_str);
        let group = ctx
            .config
            .get("resource_group")
            .map_or("rg-default", String::as_str);
        let digest = Sha256::digest(ctx.deployment_id.as_bytes());
        let suffix = hex::encode(&digest[..4]);

        let mut outputs = BTreeMap::new();
        outputs.insert(
            "resource_id".to_string(),
            format!(
                "/subscriptions/simulated/resourceGroups/{group}/providers/{}/{name}",
                terraform::schema(ctx.resource_type).terraform_type
            ),
        );
        let endpoint = match ctx.resource_type {
            ResourceType::Vm => format!("10.0.1.{}", digest[1] % 250 + 4),
            ResourceType::Storage => format!("https://{name}.blob.core.windows.net/"),
            ResourceType::Aks => format!("https://{name}-{suffix}.hcp.azmk8s.io"),
            ResourceType::Sql => format!("{name}.database.windows.net"),
            ResourceType::Keyvault => format!("https://{name}.vault.azure.net/"),
            ResourceType::Vnet => ctx
                .config
                .get("address_space")
                .cloned()
                .unwrap_or_else(|| "10.0.0.0/16".to_string()),
        };
        outputs.insert("endpoint".to_string(), endpoint);
        outputs
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionExecutor for SimulatedExecutor {
    async fn execute(&self, ctx: &JobContext, logs: &LogSink) -> Result<ExecutionOutputs> {
        let delay = self.step_delay_for(&ctx.deployment_id);
        debug!(
            "Simulating {} for deployment {} (step delay {:?})",
            ctx.action, ctx.deployment_id, delay
        );

        let verb = match ctx.action {
            LifecycleAction::Provision | LifecycleAction::Update => "apply",
            LifecycleAction::Decommission => "destroy",
        };

        logs.emit("Initializing the backend...");
        tokio::time::sleep(delay).await;
        logs.emit("Initializing provider plugins... hashicorp/azurerm");
        tokio::time::sleep(delay).await;

        if verb == "apply" {
            let hcl = terraform::render(ctx.resource_type, &ctx.config, &ctx.tags);
            logs.emit(format!(
                "Rendered configuration ({} lines of HCL)",
                hcl.lines().count()
            ));
            logs.emit("Terraform will perform the following actions:");
            for (field, value) in &ctx.config {
                logs.emit(format!("  + {field} = \"{value}\""));
                tokio::time::sleep(delay).await;
            }
            logs.emit(format!(
                "{}.{}: Creating...",
                terraform::schema(ctx.resource_type).terraform_type,
                ctx.config.get("name").map_or("unnamed", String::as_str)
            ));
            tokio::time::sleep(delay).await;
            logs.emit("Apply complete! Resources: 1 added, 0 changed, 0 destroyed.");
            Ok(ExecutionOutputs {
                outputs: Self::fake_outputs(ctx),
            })
        } else {
            logs.emit(format!(
                "{}.{}: Destroying...",
                terraform::schema(ctx.resource_type).terraform_type,
                ctx.config.get("name").map_or("unnamed", String::as_str)
            ));
            tokio::time::sleep(delay).await;
            logs.emit("Destroy complete! Resources: 1 destroyed.");
            Ok(ExecutionOutputs::default())
        }
    }

    fn executor_type(&self) -> &'static str {
        "simulate"
    }
}

/// CI pipeline trigger executor.
///
/// Posts the lifecycle action to a pipeline trigger endpoint; the
/// pipeline owns the real `terraform apply`/`destroy`.
#[derive(Debug)]
pub struct PipelineExecutor {
    /// HTTP client.
    client: reqwest::Client,
    /// Pipeline trigger URL.
    url: String,
    /// Bearer token for the trigger endpoint.
    token: String,
    /// Git ref the pipeline should run against.
    git_ref: String,
}

impl PipelineExecutor {
    /// Creates a pipeline executor.
    #[must_use]
    pub fn new(url: &str, token: &str, git_ref: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            token: token.to_string(),
            git_ref: git_ref.to_string(),
        }
    }
}

#[async_trait]
impl ActionExecutor for PipelineExecutor {
    async fn execute(&self, ctx: &JobContext, logs: &LogSink) -> Result<ExecutionOutputs> {
        info!(
            "Triggering pipeline for deployment {} ({})",
            ctx.deployment_id, ctx.action
        );
        logs.emit(format!(
            "Triggering CI pipeline for {} of {} '{}'...",
            ctx.action,
            ctx.resource_type,
            ctx.config.get("name").map_or("unnamed", String::as_str)
        ));

        let body = serde_json::json!({
            "ref": self.git_ref,
            "variables": {
                "DEPLOYMENT_ID": ctx.deployment_id,
                "ACTION": ctx.action.to_string(),
                "RESOURCE_TYPE": ctx.resource_type.to_string(),
            },
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| TerradeckError::Execution(ExecutionError::network(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TerradeckError::Execution(ExecutionError::pipeline(
                status.as_u16(),
                message,
            )));
        }

        let mut outputs = BTreeMap::new();
        if let Ok(json) = response.json::<serde_json::Value>().await {
            for key in ["id", "web_url"] {
                if let Some(value) = json.get(key) {
                    let value = value
                        .as_str()
                        .map_or_else(|| value.to_string(), ToString::to_string);
                    outputs.insert(format!("pipeline_{key}"), value);
                }
            }
        }

        logs.emit("Pipeline run accepted.");
        Ok(ExecutionOutputs { outputs })
    }

    fn executor_type(&self) -> &'static str {
        "pipeline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn vnet_ctx(action: LifecycleAction) -> JobContext {
        let mut config = BTreeMap::new();
        config.insert("name".to_string(), "v1".to_string());
        JobContext {
            deployment_id: "d-1".to_string(),
            action,
            resource_type: ResourceType::Vnet,
            config,
            tags: BTreeMap::new(),
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<LogLine>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line.message);
        }
        lines
    }

    #[tokio::test]
    async fn test_simulated_provision_produces_outputs_and_logs() {
        let executor = SimulatedExecutor::new().with_step_delay(Duration::ZERO);
        let (sink, mut rx) = LogSink::channel();

        let result = executor
            .execute(&vnet_ctx(LifecycleAction::Provision), &sink)
            .await
            .expect("simulated apply should succeed");

        assert!(result.outputs.contains_key("resource_id"));
        assert!(result.outputs.contains_key("endpoint"));

        let lines = drain(&mut rx);
        assert!(lines.iter().any(|l| l.contains("Apply complete!")));
    }

    #[tokio::test]
    async fn test_simulated_decommission_emits_destroy_lines() {
        let executor = SimulatedExecutor::new().with_step_delay(Duration::ZERO);
        let (sink, mut rx) = LogSink::channel();

        let result = executor
            .execute(&vnet_ctx(LifecycleAction::Decommission), &sink)
            .await
            .expect("simulated destroy should succeed");

        assert!(result.outputs.is_empty());
        let lines = drain(&mut rx);
        assert!(lines.iter().any(|l| l.contains("Destroy complete!")));
    }

    #[tokio::test]
    async fn test_pipeline_trigger_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/trigger"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 42,
                "web_url": "https://ci.example.com/runs/42",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let executor = PipelineExecutor::new(&format!("{}/trigger", server.uri()), "secret", "main");
        let (sink, mut rx) = LogSink::channel();

        let result = executor
            .execute(&vnet_ctx(LifecycleAction::Provision), &sink)
            .await
            .expect("trigger should succeed");

        assert_eq!(result.outputs.get("pipeline_id").map(String::as_str), Some("42"));
        let lines = drain(&mut rx);
        assert!(lines.iter().any(|l| l.contains("Pipeline run accepted")));
    }

    #[tokio::test]
    async fn test_pipeline_trigger_failure_is_execution_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let executor = PipelineExecutor::new(&server.uri(), "wrong", "main");
        let (sink, _rx) = LogSink::channel();

        let result = executor
            .execute(&vnet_ctx(LifecycleAction::Provision), &sink)
            .await;

        assert!(matches!(
            result,
            Err(TerradeckError::Execution(ExecutionError::PipelineFailed { status: 401, .. }))
        ));
    }
}
