// src/config/validate.rs

use std::time::Duration;

use crate::backoff::BackoffPolicy;
use crate::config::duration::parse_duration;
use crate::config::loader::{default_state_dir, expand_home};
use crate::config::model::{
    AgentConfig, PollSpec, RawAgentConfig, RawAgentEntry, RawRegistry, RawSettings,
    RawTriggerSpec, Registry, ScriptSpec, Settings, TriggerSpec,
};
use crate::errors::{AgentLoopError, Result};

const DEFAULT_POLL_WAIT: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const MAX_POLL_WAIT: Duration = Duration::from_secs(60 * 60);

impl TryFrom<RawRegistry> for Registry {
    type Error = crate::errors::AgentLoopError;

    fn try_from(raw: RawRegistry) -> std::result::Result<Self, Self::Error> {
        let settings = validate_settings(&raw.settings)?;
        Ok(Registry::new_unchecked(settings, raw.agent))
    }
}

impl Registry {
    /// Resolve and validate a single agent by name.
    pub fn agent(&self, name: &str) -> Result<AgentConfig> {
        let entry = self
            .raw_agent(name)
            .ok_or_else(|| AgentLoopError::AgentNotFound(name.to_string()))?;
        validate_agent(name, entry)
    }
}

fn validate_settings(raw: &RawSettings) -> Result<Settings> {
    if raw.image.trim().is_empty() {
        return Err(AgentLoopError::ConfigError(
            "[settings].image must not be empty".to_string(),
        ));
    }

    let base = parse_setting_duration("backoff_base", &raw.backoff_base)?;
    let cap = parse_setting_duration("backoff_cap", &raw.backoff_cap)?;
    if base.is_zero() {
        return Err(AgentLoopError::ConfigError(
            "[settings].backoff_base must be greater than zero".to_string(),
        ));
    }
    if cap < base {
        return Err(AgentLoopError::ConfigError(format!(
            "[settings].backoff_cap ({:?}) must be >= backoff_base ({:?})",
            cap, base
        )));
    }

    let state_dir = match raw.state_dir.as_deref() {
        Some(dir) if !dir.trim().is_empty() => expand_home(dir),
        _ => default_state_dir(),
    };

    Ok(Settings {
        runtime: raw.runtime,
        image: raw.image.clone(),
        state_dir,
        bootstrap_prompt: raw.bootstrap_prompt.clone(),
        always_on_prompt: raw.always_on_prompt.clone(),
        stream: raw.stream,
        backoff: BackoffPolicy::new(base, cap),
    })
}

fn parse_setting_duration(field: &str, value: &str) -> Result<Duration> {
    parse_duration(value)
        .map_err(|e| AgentLoopError::ConfigError(format!("[settings].{field}: {e}")))
}

fn validate_agent(name: &str, entry: &RawAgentEntry) -> Result<AgentConfig> {
    let raw = match entry {
        RawAgentEntry::Workspace(ws) => RawAgentConfig {
            workspace: ws.clone(),
            ..RawAgentConfig::default()
        },
        RawAgentEntry::Full(cfg) => cfg.clone(),
    };

    if raw.workspace.trim().is_empty() {
        return Err(AgentLoopError::ConfigError(format!(
            "agent '{}' has no workspace configured",
            name
        )));
    }

    let prompt = raw.prompt.filter(|p| !p.trim().is_empty());

    let triggers = raw
        .triggers
        .iter()
        .enumerate()
        .map(|(index, spec)| validate_trigger(index, spec))
        .collect::<Result<Vec<_>>>()?;

    if !triggers.is_empty() && prompt.is_none() {
        return Err(AgentLoopError::ConfigError(format!(
            "agent '{}' has triggers but no `prompt` for triggered runs",
            name
        )));
    }

    for (index, cmd) in raw.post_run.iter().enumerate() {
        if cmd.trim().is_empty() {
            return Err(AgentLoopError::ConfigError(format!(
                "agent '{}' has an empty post_run command at position {}",
                name, index
            )));
        }
    }

    Ok(AgentConfig {
        name: name.to_string(),
        workspace: expand_home(&raw.workspace),
        prompt,
        model: raw.model.filter(|m| !m.trim().is_empty()),
        env: raw.env,
        init: raw.init,
        triggers,
        post_run: raw.post_run,
    })
}

fn validate_trigger(index: usize, raw: &RawTriggerSpec) -> Result<TriggerSpec> {
    let kind = raw.kind.trim().to_lowercase();
    let label = if kind.is_empty() {
        format!("trigger#{index}")
    } else {
        format!("{kind}#{index}")
    };
    let misconfigured = |reason: String| AgentLoopError::TriggerConfig {
        trigger: label.clone(),
        reason,
    };

    match kind.as_str() {
        "poll" => {
            let url = raw
                .url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .ok_or_else(|| misconfigured("missing required field `url`".to_string()))?;
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(misconfigured(format!(
                    "`url` must start with http:// or https:// (got '{url}')"
                )));
            }

            let wait = optional_duration(raw.wait.as_deref(), DEFAULT_POLL_WAIT)
                .map_err(|e| misconfigured(format!("`wait`: {e}")))?;
            let interval = optional_duration(raw.interval.as_deref(), DEFAULT_POLL_INTERVAL)
                .map_err(|e| misconfigured(format!("`interval`: {e}")))?;
            if wait.is_zero() || interval.is_zero() {
                return Err(misconfigured(
                    "`wait` and `interval` must be greater than zero".to_string(),
                ));
            }
            if wait > MAX_POLL_WAIT || interval > MAX_POLL_WAIT {
                return Err(misconfigured(format!(
                    "`wait` and `interval` must not exceed {}s",
                    MAX_POLL_WAIT.as_secs()
                )));
            }

            Ok(TriggerSpec::Poll(PollSpec {
                url: url.trim_end_matches('/').to_string(),
                agent_id: raw.agent_id.clone().filter(|id| !id.trim().is_empty()),
                token: raw.token.clone().filter(|t| !t.trim().is_empty()),
                wait,
                interval,
            }))
        }
        "script" => {
            let command = raw
                .command
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| misconfigured("missing required field `command`".to_string()))?;
            Ok(TriggerSpec::Script(ScriptSpec {
                command: command.to_string(),
            }))
        }
        "" => Err(misconfigured("missing required field `kind`".to_string())),
        other => Err(misconfigured(format!(
            "unsupported kind '{other}' (expected \"poll\" or \"script\")"
        ))),
    }
}

fn optional_duration(value: Option<&str>, default: Duration) -> std::result::Result<Duration, String> {
    match value {
        Some(s) => parse_duration(s),
        None => Ok(default),
    }
}
