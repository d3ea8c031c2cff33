// src/engine/core.rs

//! Pure agent loop state machine.
//!
//! [`LoopCore`] consumes [`LoopEvent`]s and produces:
//! - an updated loop state
//! - a list of [`LoopCommand`]s describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::AgentLoop`) is responsible for actually
//! racing triggers, launching execution units, running hooks and listening
//! for interrupts. The core has no Tokio types and performs no IO, so every
//! transition is unit tested below without processes or timers.

use tracing::debug;

use crate::race::RaceResult;
use crate::types::RunMode;

/// Exit code reported when the loop stops because of an interrupt.
pub const INTERRUPT_EXIT_CODE: i32 = 0;

/// Exit code used when a `--once` run could not even be started.
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Bootstrapping,
    Waiting,
    Running(RunMode),
    PostRun,
    ShuttingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopOptions {
    /// Stop after the first triggered run and its hooks.
    pub once: bool,
    /// Run the bootstrap unit before the first race.
    pub bootstrap: bool,
    /// Whether the agent has any triggers; agents without them get a single
    /// always-on run.
    pub has_triggers: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    Started,
    BootstrapFinished,
    RaceFinished(RaceResult),
    /// `exit_code` is `None` when the unit could not be started.
    RunFinished { exit_code: Option<i32> },
    PostRunFinished,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopCommand {
    RunBootstrap,
    StartRace,
    RunTriggered { mode: RunMode, trigger: String },
    RunAlwaysOn,
    RunPostHooks,
    Exit { code: i32 },
}

/// Result of one [`LoopCore::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopStep {
    pub commands: Vec<LoopCommand>,
    pub keep_running: bool,
}

impl LoopStep {
    fn continue_with(command: LoopCommand) -> Self {
        Self {
            commands: vec![command],
            keep_running: true,
        }
    }

    fn exit(code: i32) -> Self {
        Self {
            commands: vec![LoopCommand::Exit { code }],
            keep_running: false,
        }
    }

    fn ignored() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: true,
        }
    }
}

#[derive(Debug)]
pub struct LoopCore {
    state: LoopState,
    options: LoopOptions,
    last_exit_code: Option<i32>,
    triggered_runs: u64,
}

impl LoopCore {
    pub fn new(options: LoopOptions) -> Self {
        Self {
            state: LoopState::Idle,
            options,
            last_exit_code: None,
            triggered_runs: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn triggered_runs(&self) -> u64 {
        self.triggered_runs
    }

    pub fn step(&mut self, event: LoopEvent) -> LoopStep {
        match (self.state, event) {
            (LoopState::ShuttingDown, _) => LoopStep {
                commands: Vec::new(),
                keep_running: false,
            },

            (_, LoopEvent::Interrupted) => {
                self.state = LoopState::ShuttingDown;
                LoopStep::exit(INTERRUPT_EXIT_CODE)
            }

            (LoopState::Idle, LoopEvent::Started) => {
                if !self.options.has_triggers {
                    self.state = LoopState::Running(RunMode::AlwaysOn);
                    LoopStep::continue_with(LoopCommand::RunAlwaysOn)
                } else if self.options.bootstrap {
                    self.state = LoopState::Bootstrapping;
                    LoopStep::continue_with(LoopCommand::RunBootstrap)
                } else {
                    self.state = LoopState::Waiting;
                    LoopStep::continue_with(LoopCommand::StartRace)
                }
            }

            (LoopState::Bootstrapping, LoopEvent::BootstrapFinished) => {
                self.state = LoopState::Waiting;
                LoopStep::continue_with(LoopCommand::StartRace)
            }

            (LoopState::Waiting, LoopEvent::RaceFinished(result)) => match result {
                RaceResult::Fired { label, .. } => {
                    let mode = if self.options.once {
                        RunMode::Once
                    } else {
                        RunMode::Triggered
                    };
                    self.state = LoopState::Running(mode);
                    LoopStep::continue_with(LoopCommand::RunTriggered {
                        mode,
                        trigger: label,
                    })
                }
                RaceResult::Cancelled => {
                    self.state = LoopState::ShuttingDown;
                    LoopStep::exit(INTERRUPT_EXIT_CODE)
                }
            },

            (LoopState::Running(RunMode::AlwaysOn), LoopEvent::RunFinished { exit_code }) => {
                self.state = LoopState::ShuttingDown;
                LoopStep::exit(exit_code.unwrap_or(LAUNCH_FAILURE_EXIT_CODE))
            }

            (LoopState::Running(_), LoopEvent::RunFinished { exit_code }) => {
                self.triggered_runs += 1;
                self.last_exit_code = exit_code;
                self.state = LoopState::PostRun;
                LoopStep::continue_with(LoopCommand::RunPostHooks)
            }

            (LoopState::PostRun, LoopEvent::PostRunFinished) => {
                if self.options.once {
                    self.state = LoopState::ShuttingDown;
                    LoopStep::exit(self.last_exit_code.unwrap_or(LAUNCH_FAILURE_EXIT_CODE))
                } else {
                    self.state = LoopState::Waiting;
                    LoopStep::continue_with(LoopCommand::StartRace)
                }
            }

            (state, event) => {
                debug!(?state, ?event, "event does not apply to current state; ignoring");
                LoopStep::ignored()
            }
        }
    }
}
