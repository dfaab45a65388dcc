//! Command-line front matter for the `weft` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use weft_domain::config::Config;

#[derive(Debug, Parser)]
#[command(name = "weft", about = "Workflow orchestration engine", version)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the orchestrator server (the default).
    Serve,
    /// Configuration inspection.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the version and exit.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Validate the configuration file and report issues.
    Validate,
    /// Print the effective configuration.
    Show,
}

/// Load the configuration. A missing file yields the defaults; a present
/// but malformed file is an error.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<Config> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)?;
    let config = toml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))?;
    Ok(config)
}
