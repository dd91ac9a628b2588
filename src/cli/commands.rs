//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Terradeck - Deployment inventory and lifecycle manager for Azure resources.
#[derive(Parser, Debug)]
#[command(name = "terradeck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "TERRADECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new Terradeck project.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the portal configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Provision a new resource.
    Provision {
        /// Resource type (vm, storage, aks, sql, keyvault, vnet).
        resource_type: String,

        /// Configuration field, repeatable (e.g. --set name=web-vnet).
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Change ticket reference.
        #[arg(short, long)]
        ticket: String,

        /// Custom tag, repeatable (e.g. --tag team=platform).
        #[arg(long = "tag", value_name = "KEY=VALUE")]
        tag: Vec<String>,

        /// Requesting user (defaults to $USER or the hostname).
        #[arg(long)]
        requested_by: Option<String>,

        /// Return immediately without waiting for the job.
        #[arg(long)]
        detach: bool,
    },

    /// Update the configuration of a deployed resource.
    Update {
        /// Deployment id.
        id: String,

        /// Field to set, repeatable.
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Field to remove, repeatable.
        #[arg(long = "unset", value_name = "KEY")]
        unset: Vec<String>,

        /// Change ticket reference.
        #[arg(short, long)]
        ticket: String,

        /// Custom tag, repeatable.
        #[arg(long = "tag", value_name = "KEY=VALUE")]
        tag: Vec<String>,

        /// Requesting user (defaults to $USER or the hostname).
        #[arg(long)]
        requested_by: Option<String>,

        /// Return immediately without waiting for the job.
        #[arg(long)]
        detach: bool,
    },

    /// Decommission a deployed resource.
    Decommission {
        /// Deployment id.
        id: String,

        /// Change ticket reference.
        #[arg(short, long)]
        ticket: String,

        /// Reason for the decommission.
        #[arg(long, default_value = "")]
        reason: String,

        /// Requesting user (defaults to $USER or the hostname).
        #[arg(long)]
        requested_by: Option<String>,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,

        /// Return immediately without waiting for the job.
        #[arg(long)]
        detach: bool,
    },

    /// Preview the changes an update would apply.
    Plan {
        /// Deployment id.
        id: String,

        /// Field to set, repeatable.
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Field to remove, repeatable.
        #[arg(long = "unset", value_name = "KEY")]
        unset: Vec<String>,
    },

    /// Render the Terraform configuration for a deployment.
    Render {
        /// Deployment id.
        id: String,
    },

    /// List deployments in the inventory.
    List {
        /// Filter by resource type.
        #[arg(short = 't', long = "type")]
        resource_type: Option<String>,

        /// Include decommissioned deployments.
        #[arg(short, long)]
        all: bool,
    },

    /// Show a single deployment in full.
    Show {
        /// Deployment id.
        id: String,
    },

    /// Show the current status, logs and outputs of a deployment.
    Status {
        /// Deployment id.
        id: String,
    },

    /// Show the audit history, newest first.
    History {
        /// Deployment id (all deployments if omitted).
        id: Option<String>,

        /// Maximum number of entries to show.
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Parses repeated `KEY=VALUE` arguments into a map.
///
/// # Errors
///
/// Returns the offending argument when it has no `=`.
pub fn parse_key_values(
    pairs: &[String],
) -> std::result::Result<std::collections::BTreeMap<String, String>, String> {
    let mut map = std::collections::BTreeMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(pair.clone());
        };
        map.insert(key.trim().to_string(), value.to_string());
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_values() {
        let map = parse_key_values(&[
            String::from("name=web-vnet"),
            String::from("address_space=10.0.0.0/16"),
        ])
        .unwrap();
        assert_eq!(map["name"], "web-vnet");
        assert_eq!(map["address_space"], "10.0.0.0/16");
    }

    #[test]
    fn test_parse_key_values_rejects_bare_key() {
        let result = parse_key_values(&[String::from("name")]);
        assert_eq!(result.unwrap_err(), "name");
    }

    #[test]
    fn test_cli_parses_provision() {
        let cli = Cli::try_parse_from([
            "terradeck",
            "provision",
            "vnet",
            "--set",
            "name=web-vnet",
            "--ticket",
            "JIRA-100",
        ])
        .unwrap();
        match cli.command {
            Commands::Provision { resource_type, set, ticket, .. } => {
                assert_eq!(resource_type, "vnet");
                assert_eq!(set.len(), 1);
                assert_eq!(ticket, "JIRA-100");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
