// src/trigger/mod.rs

//! Trigger watchers.
//!
//! A trigger is a closed set of kinds ([`Trigger::Poll`], [`Trigger::Script`])
//! behind one capability: [`Watch::watch`], which blocks until the trigger
//! fires, is cancelled, or gives up on an unrecoverable error.
//!
//! Operational failures never leave the watcher: each kind reports a
//! [`TriggerOutcome::Failed`] carrying its backoff delay, and the shared watch
//! loop sleeps (interruptibly) and retries.
//!
//! - [`poll`] long-polls a coordinator inbox over HTTP.
//! - [`script`] runs a shell command and fires on exit code 0.

pub mod poll;
pub mod script;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::config::{AgentConfig, PollSpec, ScriptSpec, TriggerSpec};
use crate::errors::{AgentLoopError, Result};

pub use poll::{PollMode, PollTrigger};
pub use script::ScriptTrigger;

/// Result of one trigger attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The watched condition is true.
    Fired,
    /// Checked successfully, condition not yet true.
    Pending { recheck_after: Duration },
    /// Operational failure; retry after the backoff delay.
    Failed {
        error: String,
        attempt: u32,
        retry_after: Duration,
    },
    /// The cancellation token fired during the attempt.
    Cancelled,
}

/// How a watcher finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchExit {
    Fired,
    Cancelled,
    /// Unrecoverable; no retry can fix it.
    Aborted(String),
}

/// Something the race can run: a labelled, cancellable, one-shot watcher.
///
/// Production watchers are [`Trigger`]s; tests provide scripted fakes.
pub trait Watch: Send + 'static {
    fn label(&self) -> &str;

    /// Consume the watcher and run it until it fires or `cancel` is raised.
    fn watch(
        self: Box<Self>,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = WatchExit> + Send>>;
}

/// Produces a fresh set of watchers for every race.
pub trait TriggerSource: Send {
    fn instantiate(&self) -> Vec<Box<dyn Watch>>;

    fn is_empty(&self) -> bool;
}

/// Everything a trigger needs besides its own spec.
#[derive(Debug, Clone)]
pub struct TriggerContext {
    pub agent_name: String,
    pub workspace: PathBuf,
    pub backoff: BackoffPolicy,
    pub http: reqwest::Client,
}

impl TriggerContext {
    pub fn new(agent: &AgentConfig, backoff: BackoffPolicy) -> Self {
        Self {
            agent_name: agent.name.clone(),
            workspace: agent.workspace.clone(),
            backoff,
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Debug)]
pub enum Trigger {
    Poll(PollTrigger),
    Script(ScriptTrigger),
}

impl Trigger {
    /// Instantiate a watcher for an already-validated spec.
    pub fn new(spec: &TriggerSpec, index: usize, ctx: &TriggerContext) -> Self {
        let label = spec.label(index);
        match spec {
            TriggerSpec::Poll(poll) => Trigger::Poll(PollTrigger::new(
                label,
                poll,
                &ctx.agent_name,
                ctx.http.clone(),
                ctx.backoff,
            )),
            TriggerSpec::Script(script) => Trigger::Script(ScriptTrigger::new(
                label,
                &script.command,
                ctx.workspace.clone(),
                ctx.backoff,
            )),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Trigger::Poll(t) => t.label(),
            Trigger::Script(t) => t.label(),
        }
    }

    async fn attempt(&mut self, cancel: &CancellationToken) -> std::result::Result<TriggerOutcome, String> {
        match self {
            Trigger::Poll(t) => Ok(t.attempt(cancel).await),
            Trigger::Script(t) => t.attempt(cancel).await,
        }
    }

    /// Attempt, back off, retry until fired, cancelled or aborted.
    pub async fn watch_until_done(mut self, cancel: CancellationToken) -> WatchExit {
        debug!(trigger = %self.label(), "watcher started");

        loop {
            if cancel.is_cancelled() {
                return WatchExit::Cancelled;
            }

            let outcome = match self.attempt(&cancel).await {
                Ok(outcome) => outcome,
                Err(reason) => {
                    warn!(trigger = %self.label(), reason = %reason, "trigger aborted");
                    return WatchExit::Aborted(reason);
                }
            };

            match outcome {
                TriggerOutcome::Fired => {
                    info!(trigger = %self.label(), "trigger fired");
                    return WatchExit::Fired;
                }
                TriggerOutcome::Cancelled => {
                    debug!(trigger = %self.label(), "watcher cancelled mid-attempt");
                    return WatchExit::Cancelled;
                }
                TriggerOutcome::Pending { recheck_after } => {
                    if !sleep_or_cancel(recheck_after, &cancel).await {
                        return WatchExit::Cancelled;
                    }
                }
                TriggerOutcome::Failed {
                    error,
                    attempt,
                    retry_after,
                } => {
                    warn!(
                        trigger = %self.label(),
                        attempt,
                        retry_after = ?retry_after,
                        error = %error,
                        "trigger attempt failed; backing off"
                    );
                    if !sleep_or_cancel(retry_after, &cancel).await {
                        debug!(trigger = %self.label(), "cancelled during backoff");
                        return WatchExit::Cancelled;
                    }
                }
            }
        }
    }
}

impl Watch for Trigger {
    fn label(&self) -> &str {
        Trigger::label(self)
    }

    fn watch(
        self: Box<Self>,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = WatchExit> + Send>> {
        Box::pin((*self).watch_until_done(cancel))
    }
}

/// The validated trigger configuration of one agent.
///
/// Construction is where misconfiguration surfaces; after that every race
/// gets brand-new watchers (and therefore fresh backoff counters).
#[derive(Debug, Clone)]
pub struct TriggerSet {
    specs: Vec<TriggerSpec>,
    ctx: TriggerContext,
}

impl TriggerSet {
    pub fn new(specs: Vec<TriggerSpec>, ctx: TriggerContext) -> Result<Self> {
        for (index, spec) in specs.iter().enumerate() {
            validate_spec(spec, index, &ctx)?;
        }
        Ok(Self { specs, ctx })
    }

    pub fn for_agent(agent: &AgentConfig, backoff: BackoffPolicy) -> Result<Self> {
        Self::new(agent.triggers.clone(), TriggerContext::new(agent, backoff))
    }

    pub fn labels(&self) -> Vec<String> {
        self.specs
            .iter()
            .enumerate()
            .map(|(i, spec)| spec.label(i))
            .collect()
    }
}

impl TriggerSource for TriggerSet {
    fn instantiate(&self) -> Vec<Box<dyn Watch>> {
        self.specs
            .iter()
            .enumerate()
            .map(|(index, spec)| Box::new(Trigger::new(spec, index, &self.ctx)) as Box<dyn Watch>)
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

fn validate_spec(spec: &TriggerSpec, index: usize, ctx: &TriggerContext) -> Result<()> {
    let misconfigured = |reason: String| AgentLoopError::TriggerConfig {
        trigger: spec.label(index),
        reason,
    };

    match spec {
        TriggerSpec::Poll(PollSpec { url, .. }) => {
            reqwest::Url::parse(url).map_err(|e| misconfigured(format!("invalid url '{url}': {e}")))?;
        }
        TriggerSpec::Script(ScriptSpec { command }) => {
            if command.trim().is_empty() {
                return Err(misconfigured("empty command".to_string()));
            }
            if !ctx.workspace.is_dir() {
                return Err(misconfigured(format!(
                    "workspace {:?} is not a directory",
                    ctx.workspace
                )));
            }
        }
    }
    Ok(())
}

/// Sleep for `delay` unless `cancel` fires first. Returns `false` when
/// cancelled.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn agent_with(triggers: Vec<TriggerSpec>, workspace: &Path) -> AgentConfig {
        let mut agent = AgentConfig::new("notes", workspace);
        agent.prompt = Some("go".to_string());
        agent.triggers = triggers;
        agent
    }

    #[test]
    fn set_instantiates_fresh_watchers_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let agent = agent_with(
            vec![
                TriggerSpec::Script(ScriptSpec {
                    command: "true".to_string(),
                }),
                TriggerSpec::Poll(PollSpec {
                    url: "http://127.0.0.1:9".to_string(),
                    agent_id: None,
                    token: None,
                    wait: Duration::from_secs(30),
                    interval: Duration::from_secs(10),
                }),
            ],
            dir.path(),
        );
        let set = TriggerSet::for_agent(&agent, BackoffPolicy::default()).unwrap();
        assert_eq!(set.labels(), vec!["script#0", "poll#1"]);

        let first = set.instantiate();
        let second = set.instantiate();
        assert_eq!(first.len(), 2);
        assert_eq!(second[1].label(), "poll#1");
    }

    #[test]
    fn script_trigger_needs_existing_workspace() {
        let agent = agent_with(
            vec![TriggerSpec::Script(ScriptSpec {
                command: "true".to_string(),
            })],
            Path::new("/definitely/not/here"),
        );
        assert!(matches!(
            TriggerSet::for_agent(&agent, BackoffPolicy::default()),
            Err(AgentLoopError::TriggerConfig { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_or_cancel_returns_early_on_cancel() {
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            child.cancel();
        });

        let started = tokio::time::Instant::now();
        assert!(!sleep_or_cancel(Duration::from_secs(60), &cancel).await);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
