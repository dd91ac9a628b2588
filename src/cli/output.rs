//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::inventory::{AuditEntry, AuditResult, Deployment, DeploymentStatus};
use crate::lifecycle::{ConfigDiff, DeploymentPoll};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Deployment row for table display.
#[derive(Tabled)]
struct DeploymentRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

/// Audit row for table display.
#[derive(Tabled)]
struct AuditRow {
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Deployment")]
    deployment: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Actor")]
    actor: String,
    #[tabled(rename = "Result")]
    result: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a list of deployments.
    #[must_use]
    pub fn format_deployment_list(&self, deployments: &[&Deployment]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(deployments).unwrap_or_default(),
            OutputFormat::Text => Self::format_deployment_list_text(deployments),
        }
    }

    /// Formats a deployment list as a table.
    fn format_deployment_list_text(deployments: &[&Deployment]) -> String {
        if deployments.is_empty() {
            return String::from("No deployments in the inventory.\n");
        }

        let rows: Vec<DeploymentRow> = deployments
            .iter()
            .map(|d| DeploymentRow {
                id: Self::truncate(&d.id, 12),
                resource_type: d.resource_type.to_string(),
                name: d.name().to_string(),
                status: Self::format_status(d.status),
                updated: d.updated_at.format("%Y-%m-%d %H:%M").to_string(),
            })
            .collect();

        let mut output = Table::new(rows).to_string();
        output.push('\n');
        let _ = write!(output, "\n{} deployment(s)\n", deployments.len());
        output
    }

    /// Formats a single deployment in full.
    #[must_use]
    pub fn format_deployment(&self, deployment: &Deployment) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(deployment).unwrap_or_default(),
            OutputFormat::Text => Self::format_deployment_text(deployment),
        }
    }

    /// Formats a deployment as text.
    fn format_deployment_text(deployment: &Deployment) -> String {
        let mut output = String::new();

        let _ = write!(
            output,
            "\nDeployment {} ({})\n\n",
            deployment.id.bold(),
            deployment.resource_type
        );
        let _ = writeln!(output, "   Status: {}", Self::format_status(deployment.status));
        let _ = writeln!(output, "   Created: {}", deployment.created_at.to_rfc3339());
        let _ = writeln!(output, "   Updated: {}", deployment.updated_at.to_rfc3339());
        if let Some(at) = deployment.last_updated_at {
            let _ = writeln!(output, "   Last config update: {}", at.to_rfc3339());
        }
        if let Some(at) = deployment.decommissioned_at {
            let _ = writeln!(output, "   Decommissioned: {}", at.to_rfc3339());
        }

        output.push_str("\n   Configuration:\n");
        for (key, value) in &deployment.config {
            let _ = writeln!(output, "     {key} = {value}");
        }

        if !deployment.tags.is_empty() {
            output.push_str("\n   Tags:\n");
            for (key, value) in &deployment.tags {
                let _ = writeln!(output, "     {key} = {value}");
            }
        }

        if !deployment.outputs.is_empty() {
            output.push_str("\n   Outputs:\n");
            for (key, value) in &deployment.outputs {
                let _ = writeln!(output, "     {key} = {value}");
            }
        }

        if !deployment.change_history.is_empty() {
            let _ = write!(output, "\n   Change history ({}):\n", deployment.change_history.len());
            for entry in &deployment.change_history {
                let _ = writeln!(
                    output,
                    "     {} {} by {} ({})",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.action,
                    entry.actor,
                    entry.ticket
                );
                if let Some(diff) = &entry.diff {
                    for field in diff.changed_fields() {
                        let _ = writeln!(output, "       ~ {field}");
                    }
                }
            }
        }

        output
    }

    /// Formats the status polling view.
    #[must_use]
    pub fn format_poll(&self, poll: &DeploymentPoll) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(poll).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = write!(
                    output,
                    "\n{}: {}\n",
                    poll.deployment_id.bold(),
                    Self::format_status(poll.status)
                );

                if !poll.logs.is_empty() {
                    output.push_str("\nLogs:\n");
                    for line in &poll.logs {
                        let _ = writeln!(
                            output,
                            "   {} {}",
                            line.timestamp.format("%H:%M:%S").to_string().dimmed(),
                            line.message
                        );
                    }
                }

                if !poll.outputs.is_empty() {
                    output.push_str("\nOutputs:\n");
                    for (key, value) in &poll.outputs {
                        let _ = writeln!(output, "   {key} = {value}");
                    }
                }

                output
            }
        }
    }

    /// Formats audit history entries, newest first.
    #[must_use]
    pub fn format_history(&self, entries: &[&AuditEntry]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(entries).unwrap_or_default(),
            OutputFormat::Text => {
                if entries.is_empty() {
                    return String::from("No audit history.\n");
                }

                let rows: Vec<AuditRow> = entries
                    .iter()
                    .map(|e| AuditRow {
                        timestamp: e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                        deployment: Self::truncate(&e.deployment_id, 12),
                        action: e.action.to_string(),
                        actor: e.actor.clone(),
                        result: Self::format_result(e.result),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats a configuration diff.
    #[must_use]
    pub fn format_diff(&self, diff: &ConfigDiff) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(diff).unwrap_or_default(),
            OutputFormat::Text => {
                if diff.is_empty() {
                    return format!("{} No changes.\n", "✓".green());
                }
                let mut output = format!("\n{} field(s) would change:\n\n", diff.len());
                let _ = write!(output, "{diff}");
                output
            }
        }
    }

    /// Formats a deployment status with color.
    fn format_status(status: DeploymentStatus) -> String {
        match status {
            DeploymentStatus::Deployed => "deployed".green().to_string(),
            DeploymentStatus::Provisioning
            | DeploymentStatus::Updating
            | DeploymentStatus::Decommissioning => status.to_string().yellow().to_string(),
            DeploymentStatus::Failed | DeploymentStatus::UpdateFailed => {
                status.to_string().red().to_string()
            }
            DeploymentStatus::Decommissioned => "decommissioned".dimmed().to_string(),
        }
    }

    /// Formats an audit result with color.
    fn format_result(result: AuditResult) -> String {
        match result {
            AuditResult::Success => "success".green().to_string(),
            AuditResult::Failure => "failure".red().to_string(),
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.len() <= max_len {
            s.to_string()
        } else {
            format!("{}...", &s[..max_len - 3])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::ResourceType;
    use std::collections::BTreeMap;

    fn sample_deployment() -> Deployment {
        let mut config = BTreeMap::new();
        config.insert(String::from("name"), String::from("web-vnet"));
        Deployment::new(ResourceType::Vnet, config)
    }

    #[test]
    fn test_list_text_includes_name_and_count() {
        let deployment = sample_deployment();
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let output = formatter.format_deployment_list(&[&deployment]);
        assert!(output.contains("web-vnet"));
        assert!(output.contains("1 deployment(s)"));
    }

    #[test]
    fn test_list_json_is_valid() {
        let deployment = sample_deployment();
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let output = formatter.format_deployment_list(&[&deployment]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0]["resource_type"], "vnet");
    }

    #[test]
    fn test_empty_list_text() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let output = formatter.format_deployment_list(&[]);
        assert!(output.contains("No deployments"));
    }
}
