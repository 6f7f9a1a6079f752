//! CLI module for the agentflow runtime
//!
//! Subcommands:
//! - `run`: execute a flow definition once and print the result
//! - `check`: validate a flow definition without executing it
//! - `nodes`: list the node types the runtime can execute

pub mod check;
pub mod nodes;
pub mod run;

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::config::AppConfig;
use crate::infrastructure::logging;
use crate::infrastructure::runner::FlowDefinition;

/// Agentflow runtime - run agentflow node pipelines from the command line
#[derive(Parser)]
#[command(name = "agentflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Execute a flow definition
    Run(run::RunArgs),

    /// Validate a flow definition without running it
    Check(check::CheckArgs),

    /// List the available node types and their inputs
    Nodes(nodes::NodesArgs),
}

/// Load `.env`, configuration and logging the same way for every command
pub(crate) fn bootstrap() -> AppConfig {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);
    config
}

pub(crate) fn read_json(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

pub(crate) fn read_flow(path: &Path) -> anyhow::Result<FlowDefinition> {
    let value = read_json(path)?;
    serde_json::from_value(value)
        .with_context(|| format!("{} is not a flow definition", path.display()))
}
