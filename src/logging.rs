// src/logging.rs

//! Logging setup for `agentloop` using `tracing` + `tracing-subscriber`.
//!
//! Filter precedence:
//! 1. `--log-level` CLI flag
//! 2. `AGENTLOOP_LOG`, any `EnvFilter` directive string
//!    (e.g. `debug` or `agentloop=debug,reqwest=trace`)
//! 3. `info`
//!
//! HTTP client internals stay at `warn` unless a directive names them.
//! Logs go to STDERR; the execution unit's streamed output owns STDOUT.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "AGENTLOOP_LOG";

const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn"];

/// Initialise the global logging subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV_VAR).ok().as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    let base = match (cli_level, env.map(str::trim).filter(|s| !s.is_empty())) {
        (Some(level), _) => level_directive(level).to_string(),
        (None, Some(directives)) => directives.to_string(),
        (None, None) => "info".to_string(),
    };

    let mut filter = EnvFilter::try_new(&base)
        .map_err(|e| anyhow!("invalid {LOG_ENV_VAR} value '{base}': {e}"))?;
    for directive in QUIET_DEPENDENCIES {
        let crate_name = directive.split('=').next().unwrap_or_default();
        if !base.contains(crate_name) {
            filter = filter.add_directive(directive.parse()?);
        }
    }
    Ok(filter)
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_level_wins_over_env() {
        let filter = build_filter(Some(LogLevel::Trace), Some("error")).unwrap();
        assert!(filter.to_string().contains("trace"));
    }

    #[test]
    fn env_directives_are_passed_through() {
        let filter = build_filter(None, Some("agentloop=debug")).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("agentloop=debug"));
        assert!(rendered.contains("reqwest=warn"));
    }

    #[test]
    fn explicit_dependency_directive_is_not_overridden() {
        let filter = build_filter(None, Some("info,reqwest=trace")).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("reqwest=trace"));
        assert!(!rendered.contains("reqwest=warn"));
    }

    #[test]
    fn garbage_env_value_is_rejected() {
        assert!(build_filter(None, Some("agentloop=notalevel")).is_err());
    }
}
