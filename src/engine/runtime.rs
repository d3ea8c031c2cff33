// src/engine/runtime.rs

use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{AgentConfig, Settings};
use crate::errors::Result;
use crate::exec::{ExecutionBackend, ExecutionRequest, ExecutionUnitRunner, run_post_run_hooks};
use crate::race::race;
use crate::trigger::TriggerSource;
use crate::types::RunMode;

use super::core::{LoopCommand, LoopCore, LoopEvent, LoopOptions};

/// Drives one agent through bootstrap, races, runs and hooks.
///
/// This is the IO shell around [`LoopCore`], which holds all of the loop's
/// semantics. Each command the core issues is executed here and turned into
/// the next event.
pub struct AgentLoop<E: ExecutionBackend, T: TriggerSource> {
    core: LoopCore,
    agent: AgentConfig,
    settings: Settings,
    runner: ExecutionUnitRunner<E>,
    triggers: T,
    shutdown: CancellationToken,
}

impl<E: ExecutionBackend, T: TriggerSource> fmt::Debug for AgentLoop<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentLoop")
            .field("agent", &self.agent.name)
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutionBackend, T: TriggerSource> AgentLoop<E, T> {
    pub fn new(
        agent: AgentConfig,
        settings: Settings,
        runner: ExecutionUnitRunner<E>,
        triggers: T,
        options: LoopOptions,
        shutdown: CancellationToken,
    ) -> Self {
        let options = LoopOptions {
            has_triggers: !triggers.is_empty(),
            ..options
        };
        Self {
            core: LoopCore::new(options),
            agent,
            settings,
            runner,
            triggers,
            shutdown,
        }
    }

    /// Main loop. Returns the process exit code.
    ///
    /// `Err` is reserved for conditions the loop cannot continue from, such
    /// as every trigger aborting.
    pub async fn run(mut self) -> Result<i32> {
        info!(agent = %self.agent.name, "agent loop started");

        let mut event = LoopEvent::Started;
        loop {
            debug!(?event, "agent loop received event");
            let step = self.core.step(event);

            let mut next = None;
            for command in step.commands {
                match command {
                    LoopCommand::Exit { code } => {
                        info!(agent = %self.agent.name, code, "agent loop exiting");
                        return Ok(code);
                    }
                    other => next = Some(self.execute(other).await?),
                }
            }

            if !step.keep_running {
                return Ok(super::core::INTERRUPT_EXIT_CODE);
            }

            event = if self.shutdown.is_cancelled() {
                LoopEvent::Interrupted
            } else {
                match next {
                    Some(e) => e,
                    None => {
                        // Ignored event with nothing in flight; only an
                        // interrupt can move us on.
                        self.shutdown.cancelled().await;
                        LoopEvent::Interrupted
                    }
                }
            };
        }
    }

    async fn execute(&mut self, command: LoopCommand) -> Result<LoopEvent> {
        match command {
            LoopCommand::RunBootstrap => {
                info!(agent = %self.agent.name, "running bootstrap");
                if self.run_unit(RunMode::Bootstrap).await != Some(0) {
                    warn!(agent = %self.agent.name, "bootstrap run did not succeed; continuing");
                }
                Ok(LoopEvent::BootstrapFinished)
            }
            LoopCommand::StartRace => {
                info!(agent = %self.agent.name, "waiting for a trigger");
                let result = race(self.triggers.instantiate(), &self.shutdown).await?;
                Ok(LoopEvent::RaceFinished(result))
            }
            LoopCommand::RunTriggered { mode, trigger } => {
                info!(agent = %self.agent.name, trigger = %trigger, "trigger fired; starting run");
                let exit_code = self.run_unit(mode).await;
                Ok(LoopEvent::RunFinished { exit_code })
            }
            LoopCommand::RunAlwaysOn => {
                info!(agent = %self.agent.name, "agent has no triggers; running once");
                let exit_code = self.run_unit(RunMode::AlwaysOn).await;
                Ok(LoopEvent::RunFinished { exit_code })
            }
            LoopCommand::RunPostHooks => {
                if !self.agent.post_run.is_empty() {
                    let report =
                        run_post_run_hooks(&self.agent.post_run, &self.agent.workspace, &self.shutdown)
                            .await;
                    debug!(agent = %self.agent.name, ?report, "post-run hooks finished");
                }
                Ok(LoopEvent::PostRunFinished)
            }
            LoopCommand::Exit { .. } => Ok(LoopEvent::Interrupted),
        }
    }

    /// Launch one unit; failures are logged and absorbed.
    async fn run_unit(&mut self, mode: RunMode) -> Option<i32> {
        let request = ExecutionRequest::for_agent(&self.agent, &self.settings, mode);
        match self.runner.run(request, self.shutdown.clone()).await {
            Ok(record) => {
                let code = record.exit_code();
                if code != 0 {
                    warn!(
                        agent = %self.agent.name,
                        mode = %mode,
                        exit_code = code,
                        elapsed = ?record.duration,
                        "execution unit failed"
                    );
                }
                Some(code)
            }
            Err(e) => {
                error!(agent = %self.agent.name, mode = %mode, error = %e, "could not run execution unit");
                None
            }
        }
    }
}
