// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `agentloop`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "agentloop",
    version,
    about = "Keep a containerised agent alive, waking it when one of its triggers fires.",
    long_about = None
)]
pub struct CliArgs {
    /// Agent to run, as named in the registry.
    #[arg(value_name = "AGENT", required_unless_present = "list")]
    pub agent: Option<String>,

    /// Path to the agent registry (TOML).
    ///
    /// Default: `~/.claude-docker/agents.toml`.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override `[settings].state_dir`.
    #[arg(long, value_name = "PATH")]
    pub state_dir: Option<PathBuf>,

    /// Bootstrap, wait for one trigger, run once, then exit with that run's
    /// exit code.
    #[arg(long)]
    pub once: bool,

    /// Go straight to waiting for triggers.
    #[arg(long)]
    pub skip_bootstrap: bool,

    /// Validate the agent, print what would run, and exit.
    #[arg(long)]
    pub dry_run: bool,

    /// List the agents in the registry and exit.
    #[arg(long)]
    pub list: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `AGENTLOOP_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
