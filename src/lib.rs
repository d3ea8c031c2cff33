// src/lib.rs

pub mod backoff;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod handoff;
pub mod logging;
pub mod race;
pub mod trigger;
pub mod types;

use std::fmt::Write as _;

use anyhow::{Context, Result, anyhow};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{AgentConfig, RawAgentEntry, Registry, Settings, TriggerSpec, default_config_path, load_and_validate};
use crate::engine::{AgentLoop, LoopOptions};
use crate::exec::{ContainerBackend, ExecutionRequest, ExecutionUnitRunner};
use crate::handoff::HandoffChannel;
use crate::trigger::TriggerSet;
use crate::types::{ContainerRuntime, RunMode};

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - registry loading and agent validation
/// - trigger construction (misconfiguration fails here, before any run)
/// - the container backend and handoff channel
/// - SIGINT / SIGTERM handling
/// - the agent loop
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut registry = load_and_validate(&config_path)
        .with_context(|| format!("loading agent registry {:?}", config_path))?;
    if let Some(dir) = &args.state_dir {
        registry.settings.state_dir = dir.clone();
    }

    if args.list {
        print!("{}", format_agent_list(&registry));
        return Ok(0);
    }

    let name = args
        .agent
        .as_deref()
        .ok_or_else(|| anyhow!("no agent given"))?;
    let agent = registry.agent(name)?;
    let settings = registry.settings.clone();
    let triggers = TriggerSet::for_agent(&agent, settings.backoff)?;

    if args.dry_run {
        print!("{}", format_dry_run(&agent, &settings, &args));
        debug!("dry-run complete (no execution)");
        return Ok(0);
    }

    let backend = ContainerBackend::from_settings(&settings)?;
    let handoff = HandoffChannel::for_agent(&settings.state_dir, &agent.name);
    let runner = ExecutionUnitRunner::new(backend, handoff);

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    let options = LoopOptions {
        once: args.once,
        bootstrap: !args.skip_bootstrap,
        ..LoopOptions::default()
    };

    info!(
        agent = %agent.name,
        triggers = ?triggers.labels(),
        once = args.once,
        "starting agent"
    );

    let agent_loop = AgentLoop::new(agent, settings, runner, triggers, options, shutdown);
    Ok(agent_loop.run().await?)
}

/// Cancel `shutdown` on Ctrl-C, or SIGTERM on unix.
fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_interrupt().await;
        info!("interrupt received; shutting down");
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_interrupt() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => Some(term),
        Err(e) => {
            warn!(error = %e, "failed to listen for SIGTERM");
            None
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
        _ = async {
            match term.as_mut() {
                Some(term) => { term.recv().await; }
                None => std::future::pending::<()>().await,
            }
        } => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// `--list` output: one line per agent with its workspace and extras.
pub fn format_agent_list(registry: &Registry) -> String {
    let mut out = String::from("Available agents:\n");
    for (name, entry) in registry.raw_agents() {
        let mut line = format!("  {:<15} {}", name, entry.workspace());
        if let RawAgentEntry::Full(cfg) = entry {
            if let Some(model) = cfg.model.as_deref().filter(|m| !m.is_empty()) {
                let _ = write!(line, " (model: {model})");
            }
            let mut extras = Vec::new();
            if !cfg.triggers.is_empty() {
                extras.push(format!("triggers: {}", cfg.triggers.len()));
            }
            if !cfg.env.is_empty() {
                extras.push(format!("env: {}", cfg.env.len()));
            }
            if !cfg.init.is_empty() {
                extras.push(format!("init: {}", cfg.init.len()));
            }
            if !cfg.post_run.is_empty() {
                extras.push(format!("post_run: {}", cfg.post_run.len()));
            }
            if !extras.is_empty() {
                let _ = write!(line, " [{}]", extras.join(" "));
            }
        }
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// `--dry-run` output: the resolved agent and what its first run would be.
pub fn format_dry_run(agent: &AgentConfig, settings: &Settings, args: &CliArgs) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "agentloop dry-run: {}", agent.name);
    let _ = writeln!(out, "  workspace: {}", agent.workspace.display());
    if let Some(prompt) = &agent.prompt {
        let _ = writeln!(out, "  prompt: {prompt}");
    }
    if let Some(model) = &agent.model {
        let _ = writeln!(out, "  model: {model}");
    }
    let _ = writeln!(out, "  image: {}", settings.image);
    let _ = writeln!(
        out,
        "  backoff: base {:?}, cap {:?}",
        settings.backoff.base(),
        settings.backoff.cap()
    );
    let _ = writeln!(
        out,
        "  handoff: {}",
        handoff::handoff_path(&settings.state_dir, &agent.name).display()
    );
    let _ = writeln!(out);

    if agent.triggers.is_empty() {
        let _ = writeln!(out, "triggers: none (single always-on run)");
    } else {
        let _ = writeln!(out, "triggers ({}):", agent.triggers.len());
        for (index, spec) in agent.triggers.iter().enumerate() {
            match spec {
                TriggerSpec::Poll(poll) => {
                    let _ = writeln!(
                        out,
                        "  - {}: {} (agent_id: {}, wait: {:?}, interval: {:?})",
                        spec.label(index),
                        poll.url,
                        poll.agent_id.as_deref().unwrap_or(&agent.name),
                        poll.wait,
                        poll.interval
                    );
                }
                TriggerSpec::Script(script) => {
                    let _ = writeln!(out, "  - {}: {}", spec.label(index), script.command);
                }
            }
        }
    }

    if !agent.post_run.is_empty() {
        let _ = writeln!(out, "post_run ({}):", agent.post_run.len());
        for hook in &agent.post_run {
            let _ = writeln!(out, "  - {hook}");
        }
    }

    let first_mode = match (agent.has_triggers(), args.skip_bootstrap) {
        (false, _) => RunMode::AlwaysOn,
        (true, false) => RunMode::Bootstrap,
        (true, true) if args.once => RunMode::Once,
        (true, true) => RunMode::Triggered,
    };
    let request = ExecutionRequest::for_agent(agent, settings, first_mode);
    let _ = writeln!(out);
    match settings.runtime.or_else(ContainerRuntime::detect) {
        Some(runtime) => {
            let backend = ContainerBackend::new(runtime, settings);
            let args = backend.build_args(&request, &format!("agentloop-{}", agent.name), None);
            let _ = writeln!(out, "first run ({first_mode}):");
            let _ = writeln!(out, "  {} {}", runtime.binary(), args.join(" "));
        }
        None => {
            let _ = writeln!(out, "first run ({first_mode}): no container runtime found");
        }
    }

    out
}
