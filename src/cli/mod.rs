//! Command-line interface for Terradeck.
//!
//! This module defines the CLI structure and output formatting.

mod commands;
mod output;

pub use commands::{parse_key_values, Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
