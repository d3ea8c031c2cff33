#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use agentloop::backoff::BackoffPolicy;
use agentloop::config::{AgentConfig, PollSpec, ScriptSpec, Settings, TriggerSpec};
use agentloop::types::ContainerRuntime;

/// Builder for `AgentConfig` to simplify test setup.
pub struct AgentConfigBuilder {
    agent: AgentConfig,
}

impl AgentConfigBuilder {
    pub fn new(name: &str, workspace: impl Into<PathBuf>) -> Self {
        Self {
            agent: AgentConfig::new(name, workspace),
        }
    }

    pub fn prompt(mut self, prompt: &str) -> Self {
        self.agent.prompt = Some(prompt.to_string());
        self
    }

    pub fn model(mut self, model: &str) -> Self {
        self.agent.model = Some(model.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.agent.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn init(mut self, cmd: &str) -> Self {
        self.agent.init.push(cmd.to_string());
        self
    }

    pub fn script_trigger(mut self, command: &str) -> Self {
        self.agent.triggers.push(TriggerSpec::Script(ScriptSpec {
            command: command.to_string(),
        }));
        self
    }

    pub fn poll_trigger(mut self, url: &str) -> Self {
        self.agent.triggers.push(TriggerSpec::Poll(PollSpec {
            url: url.trim_end_matches('/').to_string(),
            agent_id: None,
            token: None,
            wait: Duration::from_secs(30),
            interval: Duration::from_secs(10),
        }));
        self
    }

    pub fn post_run(mut self, cmd: &str) -> Self {
        self.agent.post_run.push(cmd.to_string());
        self
    }

    pub fn build(self) -> AgentConfig {
        self.agent
    }
}

/// Backoff short enough for tests that exercise real retries.
pub fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy::new(Duration::from_millis(20), Duration::from_millis(80))
}

/// Settings rooted at `state_dir`, with a fast backoff and no streaming.
pub fn test_settings(state_dir: &Path) -> Settings {
    Settings {
        runtime: Some(ContainerRuntime::Docker),
        image: "claude-code".to_string(),
        state_dir: state_dir.to_path_buf(),
        bootstrap_prompt: "/c3po auto".to_string(),
        always_on_prompt: "/c3po auto".to_string(),
        stream: false,
        backoff: fast_backoff(),
    }
}
