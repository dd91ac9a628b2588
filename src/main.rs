//! Terradeck CLI entrypoint.
//!
//! This is the main entrypoint for the terradeck command-line tool.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use terradeck::cli::{parse_key_values, Cli, Commands, OutputFormatter};
use terradeck::config::{
    find_config_file, ConfigParser, ConfigValidator, ExecutorMode, PortalConfig,
};
use terradeck::error::{Result, TerradeckError};
use terradeck::inventory::{
    BlobBackend, InventoryStore, LocalBackend, MirroredBackend, ResourceType, StorageBackend,
    INVENTORY_DIR, INVENTORY_FILE,
};
use terradeck::lifecycle::{ActionReceipt, LifecycleTracker, ProvisionRequest};
use terradeck::runner::{ActionExecutor, PipelineExecutor, SimulatedExecutor};
use terradeck::terraform;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings),
        Commands::Provision {
            resource_type,
            set,
            ticket,
            tag,
            requested_by,
            detach,
        } => {
            cmd_provision(
                cli.config.as_ref(),
                &resource_type,
                &set,
                ticket,
                &tag,
                requested_by,
                detach,
                &formatter,
            )
            .await
        }
        Commands::Update {
            id,
            set,
            unset,
            ticket,
            tag,
            requested_by,
            detach,
        } => {
            cmd_update(
                cli.config.as_ref(),
                &id,
                &set,
                &unset,
                &ticket,
                &tag,
                requested_by,
                detach,
                &formatter,
            )
            .await
        }
        Commands::Decommission {
            id,
            ticket,
            reason,
            requested_by,
            yes,
            detach,
        } => {
            cmd_decommission(
                cli.config.as_ref(),
                &id,
                &ticket,
                &reason,
                requested_by,
                yes,
                detach,
                &formatter,
            )
            .await
        }
        Commands::Plan { id, set, unset } => {
            cmd_plan(cli.config.as_ref(), &id, &set, &unset, &formatter).await
        }
        Commands::Render { id } => cmd_render(cli.config.as_ref(), &id).await,
        Commands::List { resource_type, all } => {
            cmd_list(cli.config.as_ref(), resource_type.as_deref(), all, &formatter).await
        }
        Commands::Show { id } => cmd_show(cli.config.as_ref(), &id, &formatter).await,
        Commands::Status { id } => cmd_status(cli.config.as_ref(), &id, &formatter).await,
        Commands::History { id, limit } => {
            cmd_history(cli.config.as_ref(), id.as_deref(), limit, &formatter).await
        }
    }
}

/// Initialize a new project.
fn cmd_init(path: &PathBuf, force: bool) -> Result<()> {
    info!("Initializing new Terradeck project in: {}", path.display());

    let config_path = path.join("terradeck.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    // Check if files exist
    if !force && config_path.exists() {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    // Create directory if needed
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    // Write config template
    let config_template = include_str!("../templates/terradeck.yaml");
    std::fs::write(&config_path, config_template)?;
    eprintln!("Created: {}", config_path.display());

    // Write .env.example
    let env_template = include_str!("../templates/.env.example");
    std::fs::write(&env_path, env_template)?;
    eprintln!("Created: {}", env_path.display());

    // Write/update .gitignore
    let gitignore_content = ".env\n.terradeck/\n";
    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        if !existing.contains(".env") || !existing.contains(".terradeck") {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n# Terradeck")?;
            if !existing.contains(".env") {
                writeln!(file, ".env")?;
            }
            if !existing.contains(".terradeck") {
                writeln!(file, ".terradeck/")?;
            }
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, gitignore_content)?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nProject initialized successfully!");
    eprintln!("Next steps:");
    eprintln!("  1. Copy .env.example to .env and fill in your secrets");
    eprintln!("  2. Edit terradeck.yaml with your project settings");
    eprintln!("  3. Run 'terradeck validate' to check your configuration");
    eprintln!("  4. Run 'terradeck provision <type> --set name=... --ticket ...'");

    Ok(())
}

/// Validate configuration.
fn cmd_validate(config_path: Option<&PathBuf>, show_warnings: bool) -> Result<()> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(
        config_file
            .parent()
            .unwrap_or_else(|| std::path::Path::new(".")),
    );
    parser.load_dotenv()?;

    let config = parser.load_file(&config_file)?;

    let validator = ConfigValidator::new();
    let result = validator.validate(&config)?;

    eprintln!("Configuration is valid!");
    if show_warnings && !result.warnings.is_empty() {
        eprintln!("\nWarnings:");
        for warning in &result.warnings {
            eprintln!("  - {warning}");
        }
    }

    eprintln!("\nConfiguration summary:");
    eprintln!("  Project: {}", config.project.name);
    eprintln!("  Environment: {}", config.project.environment);
    eprintln!(
        "  Inventory: {}",
        config
            .inventory
            .path
            .as_deref()
            .unwrap_or(".terradeck/inventory.json")
    );
    eprintln!(
        "  Executor: {}",
        match config.executor.mode {
            ExecutorMode::Simulate => "simulate",
            ExecutorMode::Pipeline => "pipeline",
        }
    );

    Ok(())
}

/// Provision a new resource.
#[allow(clippy::too_many_arguments)]
async fn cmd_provision(
    config_path: Option<&PathBuf>,
    resource_type: &str,
    set: &[String],
    ticket: String,
    tag: &[String],
    requested_by: Option<String>,
    detach: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let resource_type = parse_resource_type(resource_type)?;
    let config = parse_pairs(set)?;
    let tags = parse_pairs(tag)?;

    let (portal, tracker) = load_tracker(config_path).await?;

    let receipt = tracker
        .provision(ProvisionRequest {
            resource_type,
            config,
            ticket,
            environment: portal.project.environment.clone(),
            location: portal.project.location.clone(),
            tags,
            requested_by: requested_by.unwrap_or_else(default_actor),
        })
        .await?;

    eprintln!(
        "Provisioning started: {} ({})",
        receipt.deployment_id, receipt.status
    );

    finish_or_detach(&tracker, receipt, detach, formatter).await
}

/// Update a deployed resource.
#[allow(clippy::too_many_arguments)]
async fn cmd_update(
    config_path: Option<&PathBuf>,
    id: &str,
    set: &[String],
    unset: &[String],
    ticket: &str,
    tag: &[String],
    requested_by: Option<String>,
    detach: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (_portal, tracker) = load_tracker(config_path).await?;

    let proposed = proposed_config(&tracker, id, set, unset).await?;
    let tags = parse_pairs(tag)?;

    let receipt = tracker
        .update(
            id,
            proposed,
            ticket,
            tags,
            &requested_by.unwrap_or_else(default_actor),
        )
        .await?;

    eprintln!("Update started: {} ({})", receipt.deployment_id, receipt.status);

    finish_or_detach(&tracker, receipt, detach, formatter).await
}

/// Decommission a deployed resource.
#[allow(clippy::too_many_arguments)]
async fn cmd_decommission(
    config_path: Option<&PathBuf>,
    id: &str,
    ticket: &str,
    reason: &str,
    requested_by: Option<String>,
    auto_approve: bool,
    detach: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (_portal, tracker) = load_tracker(config_path).await?;

    let deployment = tracker.deployment(id).await?;
    eprintln!(
        "Deployment {} ({} '{}') will be decommissioned.",
        deployment.id,
        deployment.resource_type,
        deployment.name()
    );

    // Confirm
    if !auto_approve {
        eprint!("\nThis destroys the underlying resource. Type 'decommission' to confirm: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != "decommission" {
            eprintln!("Decommission cancelled.");
            return Ok(());
        }
    }

    let receipt = tracker
        .decommission(id, ticket, &requested_by.unwrap_or_else(default_actor), reason)
        .await?;

    eprintln!(
        "Decommission started: {} ({})",
        receipt.deployment_id, receipt.status
    );

    finish_or_detach(&tracker, receipt, detach, formatter).await
}

/// Preview an update.
async fn cmd_plan(
    config_path: Option<&PathBuf>,
    id: &str,
    set: &[String],
    unset: &[String],
    formatter: &OutputFormatter,
) -> Result<()> {
    let (_portal, tracker) = load_tracker(config_path).await?;

    let proposed = proposed_config(&tracker, id, set, unset).await?;
    let diff = tracker.plan(id, &proposed).await?;

    eprintln!("{}", formatter.format_diff(&diff));
    Ok(())
}

/// Render the Terraform configuration for a deployment.
async fn cmd_render(config_path: Option<&PathBuf>, id: &str) -> Result<()> {
    let (_portal, tracker) = load_tracker(config_path).await?;

    let deployment = tracker.deployment(id).await?;
    let hcl = terraform::render(deployment.resource_type, &deployment.config, &deployment.tags);

    eprintln!("{hcl}");
    Ok(())
}

/// List deployments.
async fn cmd_list(
    config_path: Option<&PathBuf>,
    resource_type: Option<&str>,
    include_decommissioned: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (_portal, tracker) = load_tracker(config_path).await?;
    let doc = tracker.inventory().await;

    let filter = resource_type.map(parse_resource_type).transpose()?;
    let deployments: Vec<_> = if include_decommissioned {
        doc.resources.iter().collect()
    } else {
        doc.active_deployments()
    };
    let deployments: Vec<_> = deployments
        .into_iter()
        .filter(|d| filter.is_none_or(|t| d.resource_type == t))
        .collect();

    eprintln!("{}", formatter.format_deployment_list(&deployments));
    Ok(())
}

/// Show a single deployment.
async fn cmd_show(
    config_path: Option<&PathBuf>,
    id: &str,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (_portal, tracker) = load_tracker(config_path).await?;
    let deployment = tracker.deployment(id).await?;

    eprintln!("{}", formatter.format_deployment(&deployment));
    Ok(())
}

/// Show the polling view for a deployment.
async fn cmd_status(
    config_path: Option<&PathBuf>,
    id: &str,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (_portal, tracker) = load_tracker(config_path).await?;
    let poll = tracker.poll(id).await?;

    eprintln!("{}", formatter.format_poll(&poll));
    Ok(())
}

/// Show audit history.
async fn cmd_history(
    config_path: Option<&PathBuf>,
    id: Option<&str>,
    limit: usize,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (_portal, tracker) = load_tracker(config_path).await?;
    let doc = tracker.inventory().await;

    let entries: Vec<_> = match id {
        Some(deployment_id) => doc.history_for(deployment_id).into_iter().take(limit).collect(),
        None => doc.history.iter().take(limit).collect(),
    };

    eprintln!("{}", formatter.format_history(&entries));
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads configuration and wires up the store, executor and tracker.
async fn load_tracker(
    config_path: Option<&PathBuf>,
) -> Result<(PortalConfig, LifecycleTracker)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let base_dir = config_file
        .parent()
        .unwrap_or_else(|| std::path::Path::new("."))
        .to_path_buf();

    let parser = ConfigParser::new().with_base_path(&base_dir);
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;

    // Validate
    let validator = ConfigValidator::new();
    validator.validate(&config)?;
    ConfigParser::validate_required_env(&config)?;

    // Create storage backend based on config
    let local_path = config.inventory.path.as_ref().map_or_else(
        || base_dir.join(INVENTORY_DIR).join(INVENTORY_FILE),
        PathBuf::from,
    );
    let local = Box::new(LocalBackend::with_path(local_path));

    let backend: Box<dyn StorageBackend> = match &config.inventory.blob {
        Some(blob) => {
            let sas = ConfigParser::get_blob_sas()?;
            let mirror = Box::new(BlobBackend::new(
                &blob.account,
                &blob.container,
                blob.prefix.as_deref(),
                &sas,
            ));
            Box::new(MirroredBackend::new(local, mirror))
        }
        None => local,
    };

    let store = Arc::new(InventoryStore::open(backend).await?);

    // Create executor based on config
    let executor: Arc<dyn ActionExecutor> = match config.executor.mode {
        ExecutorMode::Simulate => Arc::new(SimulatedExecutor::new()),
        ExecutorMode::Pipeline => {
            let url = config
                .executor
                .pipeline_url
                .as_deref()
                .ok_or_else(|| TerradeckError::internal("Pipeline URL not configured"))?;
            let token = ConfigParser::get_pipeline_token()?;
            Arc::new(PipelineExecutor::new(url, &token, &config.executor.git_ref))
        }
    };

    let tracker = LifecycleTracker::new(store, executor);
    Ok((config, tracker))
}

/// Waits for the job unless `--detach` was given, then shows the result.
async fn finish_or_detach(
    tracker: &LifecycleTracker,
    receipt: ActionReceipt,
    detach: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    if detach {
        eprintln!(
            "Detached. Check progress with 'terradeck status {}'.",
            receipt.deployment_id
        );
        return Ok(());
    }

    let deployment_id = receipt.deployment_id.clone();
    receipt
        .job
        .await
        .map_err(|e| TerradeckError::internal(format!("Job task failed: {e}")))?;

    let poll = tracker.poll(&deployment_id).await?;
    eprintln!("{}", formatter.format_poll(&poll));
    Ok(())
}

/// Builds the proposed update configuration from the current one.
async fn proposed_config(
    tracker: &LifecycleTracker,
    id: &str,
    set: &[String],
    unset: &[String],
) -> Result<BTreeMap<String, String>> {
    let mut proposed = tracker.deployment(id).await?.config;
    for (key, value) in parse_pairs(set)? {
        proposed.insert(key, value);
    }
    for key in unset {
        proposed.remove(key.trim());
    }
    Ok(proposed)
}

/// Parses a resource type argument.
fn parse_resource_type(s: &str) -> Result<ResourceType> {
    ResourceType::from_str(s).map_err(TerradeckError::internal)
}

/// Parses repeated KEY=VALUE arguments.
fn parse_pairs(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    parse_key_values(pairs)
        .map_err(|arg| TerradeckError::internal(format!("Invalid KEY=VALUE argument: '{arg}'")))
}

/// The default actor identity: $USER, falling back to the hostname.
fn default_actor() -> String {
    std::env::var("USER").ok().unwrap_or_else(|| {
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| String::from("unknown"))
    })
}
