// src/exec/container.rs

//! Production execution backend: one `docker run` / `finch run` per unit.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::errors::{AgentLoopError, Result};
use crate::exec::backend::{ExecutionBackend, ExecutionRequest, ExecutionStatus};
use crate::types::ContainerRuntime;

pub const OAUTH_TOKEN_ENV: &str = "CLAUDE_CODE_OAUTH_TOKEN";
/// Forwarded into the container when set on the host.
pub const DEBUG_ENV: &str = "C3PO_DEBUG";

const CONTAINER_HOME: &str = "/home/node";
const CONTAINER_HANDOFF_FILE: &str = "/home/node/.trigger-handoff";
const STOP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct ContainerBackend {
    runtime: ContainerRuntime,
    image: String,
    state_dir: PathBuf,
    credentials: Option<PathBuf>,
    stream: bool,
    debug: Option<String>,
    launched: u64,
}

impl ContainerBackend {
    pub fn new(runtime: ContainerRuntime, settings: &Settings) -> Self {
        let credentials = dirs::home_dir()
            .map(|home| home.join(".claude").join(".credentials.json"))
            .filter(|path| path.is_file());

        Self {
            runtime,
            image: settings.image.clone(),
            state_dir: settings.state_dir.clone(),
            credentials,
            stream: settings.stream,
            debug: std::env::var(DEBUG_ENV).ok().filter(|v| !v.is_empty()),
            launched: 0,
        }
    }

    /// Use the configured runtime, or detect one on `PATH`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let runtime = settings
            .runtime
            .or_else(ContainerRuntime::detect)
            .ok_or_else(|| {
                AgentLoopError::ConfigError(
                    "no container runtime found; install docker or finch".to_string(),
                )
            })?;
        Ok(Self::new(runtime, settings))
    }

    pub fn with_credentials(mut self, credentials: Option<PathBuf>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_debug(mut self, debug: Option<String>) -> Self {
        self.debug = debug;
        self
    }

    /// `CLAUDE_CODE_OAUTH_TOKEN` from the environment, else the token file
    /// written by setup.
    pub fn oauth_token(&self) -> Option<String> {
        std::env::var(OAUTH_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                std::fs::read_to_string(self.state_dir.join(".oauth-token"))
                    .ok()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
            })
    }

    /// Full argument list for `<runtime> ...`.
    pub fn build_args(
        &self,
        request: &ExecutionRequest,
        container_name: &str,
        oauth_token: Option<&str>,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "--rm".into(),
            "--name".into(),
            container_name.to_string(),
        ];

        let mut env = |key: &str, value: &str| {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        };
        env("CLAUDE_PROJECT_NAME", &request.agent);
        env("CLAUDE_AGENT_MODE", "1");
        env("AGENTLOOP_RUN_MODE", request.mode.as_str());
        env("TRIGGER_HANDOFF_FILE", CONTAINER_HANDOFF_FILE);
        if let Some(token) = oauth_token {
            env(OAUTH_TOKEN_ENV, token);
        }
        if let Some(debug) = &self.debug {
            env(DEBUG_ENV, debug);
        }
        for (key, value) in &request.env {
            env(key, value);
        }
        if !request.init.is_empty() {
            env("AGENT_INIT", &encode_init_commands(&request.init));
        }

        let mut mount = |host: &Path, target: &str, read_only: bool| {
            args.push("-v".into());
            let suffix = if read_only { ":ro" } else { "" };
            args.push(format!("{}:{target}{suffix}", host.display()));
        };
        mount(&self.state_dir, &format!("{CONTAINER_HOME}/.claude"), false);
        mount(&request.workspace, "/workspace", false);
        if let Some(credentials) = &self.credentials {
            mount(
                credentials,
                &format!("{CONTAINER_HOME}/.claude/.credentials.json"),
                true,
            );
        }
        mount(
            &self.state_dir.join("claude-docker.yaml"),
            &format!("{CONTAINER_HOME}/claude-docker.yaml"),
            false,
        );
        mount(
            &self.state_dir.join(".claude.json"),
            &format!("{CONTAINER_HOME}/.claude.json"),
            false,
        );
        mount(&request.handoff_file, CONTAINER_HANDOFF_FILE, false);

        args.push(self.image.clone());
        if self.stream {
            args.extend([
                "--output-format".to_string(),
                "stream-json".to_string(),
                "--verbose".to_string(),
            ]);
        }
        args.push("-p".into());
        args.push(request.prompt.clone());
        if let Some(model) = &request.model {
            args.push("--model".into());
            args.push(model.clone());
        }

        args
    }

    fn next_container_name(&mut self, agent: &str) -> String {
        self.launched += 1;
        format!("agentloop-{}-{}-{}", agent, std::process::id(), self.launched)
    }

    async fn run_container(
        &mut self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<ExecutionStatus> {
        let name = self.next_container_name(&request.agent);
        let token = self.oauth_token();
        let args = self.build_args(&request, &name, token.as_deref());
        let binary = self.runtime.binary();

        info!(
            agent = %request.agent,
            mode = %request.mode,
            container = %name,
            "launching execution unit"
        );

        let mut child = Command::new(binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning `{binary} run` for agent '{}'", request.agent))?;

        tokio::select! {
            status = child.wait() => {
                let status = status
                    .with_context(|| format!("waiting for container {name}"))?;
                Ok(ExecutionStatus::Exited(status.code().unwrap_or(-1)))
            }
            _ = cancel.cancelled() => {
                info!(container = %name, "interrupt received; stopping container");
                if let Err(e) = child.kill().await {
                    warn!(container = %name, error = %e, "failed to kill container client");
                }
                stop_container(binary, &name).await;
                Ok(ExecutionStatus::Interrupted)
            }
        }
    }
}

impl ExecutionBackend for ContainerBackend {
    fn launch(
        &mut self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<ExecutionStatus>> + Send + '_>> {
        Box::pin(self.run_container(request, cancel))
    }
}

/// Best-effort `<runtime> stop <name>`; the container may already be gone.
async fn stop_container(binary: &str, name: &str) {
    let stop = Command::new(binary)
        .args(["stop", name])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match tokio::time::timeout(STOP_TIMEOUT, stop).await {
        Ok(Ok(status)) => debug!(container = %name, ?status, "container stop finished"),
        Ok(Err(e)) => debug!(container = %name, error = %e, "container stop failed"),
        Err(_) => warn!(container = %name, "timed out stopping container"),
    }
}

/// Init commands as base64-encoded JSON array, the format the container
/// entrypoint decodes.
pub fn encode_init_commands(commands: &[String]) -> String {
    let json = serde_json::to_string(commands).unwrap_or_else(|_| "[]".to_string());
    STANDARD.encode(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffPolicy;
    use crate::types::RunMode;
    use std::collections::BTreeMap;

    fn settings() -> Settings {
        Settings {
            runtime: Some(ContainerRuntime::Docker),
            image: "claude-code".to_string(),
            state_dir: PathBuf::from("/state"),
            bootstrap_prompt: "/c3po auto".to_string(),
            always_on_prompt: "/c3po auto".to_string(),
            stream: false,
            backoff: BackoffPolicy::default(),
        }
    }

    fn request() -> ExecutionRequest {
        ExecutionRequest {
            agent: "notes".to_string(),
            mode: RunMode::Triggered,
            workspace: PathBuf::from("/work/notes"),
            prompt: "check inbox".to_string(),
            model: None,
            env: BTreeMap::new(),
            init: Vec::new(),
            handoff_file: PathBuf::from("/state/agents/notes-trigger-handoff"),
        }
    }

    #[test]
    fn minimal_invocation_ends_with_image_and_prompt() {
        let backend = ContainerBackend::new(ContainerRuntime::Docker, &settings()).with_credentials(None);
        let args = backend.build_args(&request(), "agentloop-notes-1-1", None);

        assert_eq!(&args[..4], ["run", "--rm", "--name", "agentloop-notes-1-1"]);
        assert_eq!(&args[args.len() - 3..], ["claude-code", "-p", "check inbox"]);
        assert!(!args.iter().any(|a| a.starts_with("AGENT_INIT=")));
        assert!(!args.iter().any(|a| a.starts_with(OAUTH_TOKEN_ENV)));
    }

    #[test]
    fn stream_and_model_flags() {
        let mut s = settings();
        s.stream = true;
        let backend = ContainerBackend::new(ContainerRuntime::Finch, &s).with_credentials(None);
        let mut req = request();
        req.model = Some("opus".to_string());

        let args = backend.build_args(&req, "n", None);
        let image = args.iter().position(|a| a == "claude-code").unwrap();
        assert_eq!(
            &args[image..],
            [
                "claude-code",
                "--output-format",
                "stream-json",
                "--verbose",
                "-p",
                "check inbox",
                "--model",
                "opus",
            ]
        );
    }

    #[test]
    fn encodes_init_commands_as_base64_json() {
        let encoded = encode_init_commands(&["git pull".to_string(), "make".to_string()]);
        let decoded = STANDARD.decode(encoded).unwrap();
        let commands: Vec<String> = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(commands, vec!["git pull", "make"]);
    }

    #[test]
    fn container_names_are_unique_per_launch() {
        let mut backend = ContainerBackend::new(ContainerRuntime::Docker, &settings());
        let a = backend.next_container_name("notes");
        let b = backend.next_container_name("notes");
        assert_ne!(a, b);
        assert!(a.starts_with("agentloop-notes-"));
    }
}
