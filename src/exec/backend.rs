// src/exec/backend.rs

//! Pluggable execution backend abstraction.
//!
//! The runner talks to an `ExecutionBackend` instead of spawning containers
//! directly. Production uses [`ContainerBackend`](super::container::ContainerBackend);
//! tests provide backends that record requests and return scripted statuses.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::config::{AgentConfig, Settings};
use crate::errors::Result;
use crate::handoff::handoff_path;
use crate::types::RunMode;

/// Everything needed to launch one execution unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub agent: String,
    pub mode: RunMode,
    pub workspace: PathBuf,
    pub prompt: String,
    pub model: Option<String>,
    pub env: BTreeMap<String, String>,
    pub init: Vec<String>,
    /// Host path of the handoff file the unit writes its run id to.
    pub handoff_file: PathBuf,
}

impl ExecutionRequest {
    /// Build the request for `mode`. Bootstrap runs use the fixed bootstrap
    /// prompt; every other mode uses the agent's prompt, falling back to the
    /// always-on prompt for agents that have none.
    pub fn for_agent(agent: &AgentConfig, settings: &Settings, mode: RunMode) -> Self {
        let prompt = match mode {
            RunMode::Bootstrap => settings.bootstrap_prompt.clone(),
            RunMode::Triggered | RunMode::Once | RunMode::AlwaysOn => agent
                .prompt
                .clone()
                .unwrap_or_else(|| settings.always_on_prompt.clone()),
        };

        Self {
            agent: agent.name.clone(),
            mode,
            workspace: agent.workspace.clone(),
            prompt,
            model: agent.model.clone(),
            env: agent.env.clone(),
            init: agent.init.clone(),
            handoff_file: handoff_path(&settings.state_dir, &agent.name),
        }
    }
}

/// How an execution unit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Exit code; `-1` when the process was killed by a signal.
    Exited(i32),
    /// Stopped because the cancellation token fired.
    Interrupted,
}

impl ExecutionStatus {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecutionStatus::Exited(code) => Some(*code),
            ExecutionStatus::Interrupted => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Exited(0))
    }
}

/// Trait abstracting how execution units are launched.
pub trait ExecutionBackend: Send {
    /// Launch the unit and wait for it to exit or for `cancel` to fire.
    ///
    /// An `Err` means the unit could not be started at all.
    fn launch(
        &mut self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<ExecutionStatus>> + Send + '_>>;
}
