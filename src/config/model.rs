// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::backoff::BackoffPolicy;
use crate::types::ContainerRuntime;

/// Agent registry as read from a TOML file.
///
/// ```toml
/// [settings]
/// image = "claude-code"
///
/// [agent]
/// scratch = "~/scratch"
///
/// [agent.notes]
/// workspace = "~/notes"
/// prompt = "Check the inbox and act on new messages."
/// post_run = ["git push"]
///
/// [[agent.notes.trigger]]
/// kind = "script"
/// command = "./has-work.sh"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRegistry {
    /// Registry-wide settings from `[settings]`.
    #[serde(default)]
    pub settings: RawSettings,

    /// Agents from `[agent]` / `[agent.<name>]`, keyed by agent name.
    #[serde(default)]
    pub agent: BTreeMap<String, RawAgentEntry>,
}

/// `[settings]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSettings {
    /// `"docker"` or `"finch"`; auto-detected from `PATH` when omitted.
    #[serde(default)]
    pub runtime: Option<ContainerRuntime>,

    #[serde(default = "default_image")]
    pub image: String,

    /// Directory holding credentials, the container's `.claude` config and
    /// the per-agent handoff files.
    #[serde(default)]
    pub state_dir: Option<String>,

    #[serde(default = "default_agent_prompt")]
    pub bootstrap_prompt: String,

    #[serde(default = "default_agent_prompt")]
    pub always_on_prompt: String,

    /// Ask the agent for `stream-json` output.
    #[serde(default = "default_stream")]
    pub stream: bool,

    #[serde(default = "default_backoff_base")]
    pub backoff_base: String,

    #[serde(default = "default_backoff_cap")]
    pub backoff_cap: String,
}

fn default_image() -> String {
    "claude-code".to_string()
}

fn default_agent_prompt() -> String {
    "/c3po auto".to_string()
}

fn default_stream() -> bool {
    true
}

fn default_backoff_base() -> String {
    "5s".to_string()
}

fn default_backoff_cap() -> String {
    "60s".to_string()
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            runtime: None,
            image: default_image(),
            state_dir: None,
            bootstrap_prompt: default_agent_prompt(),
            always_on_prompt: default_agent_prompt(),
            stream: default_stream(),
            backoff_base: default_backoff_base(),
            backoff_cap: default_backoff_cap(),
        }
    }
}

/// An `[agent]` entry: either a bare workspace path or a full table.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAgentEntry {
    Workspace(String),
    Full(RawAgentConfig),
}

impl RawAgentEntry {
    pub fn workspace(&self) -> &str {
        match self {
            RawAgentEntry::Workspace(ws) => ws,
            RawAgentEntry::Full(cfg) => &cfg.workspace,
        }
    }
}

/// `[agent.<name>]` table.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawAgentConfig {
    #[serde(default)]
    pub workspace: String,

    /// Prompt used for trigger-driven runs.
    #[serde(default)]
    pub prompt: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Commands the container runs before the agent starts.
    #[serde(default)]
    pub init: Vec<String>,

    /// `[[agent.<name>.trigger]]` entries, in order.
    #[serde(default, rename = "trigger")]
    pub triggers: Vec<RawTriggerSpec>,

    /// Host-side commands run in the workspace after every triggered run.
    #[serde(default)]
    pub post_run: Vec<String>,
}

/// `[[agent.<name>.trigger]]` entry before validation.
///
/// The `kind` is kept as a plain string here so that an unsupported kind is
/// reported by validation with the trigger's position, rather than as an
/// opaque deserialization failure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTriggerSpec {
    #[serde(default)]
    pub kind: String,

    // poll
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub wait: Option<String>,
    #[serde(default)]
    pub interval: Option<String>,

    // script
    #[serde(default)]
    pub command: Option<String>,
}

/// Validated registry: settings plus the raw agent entries.
///
/// Agents are validated one at a time by [`Registry::agent`], so a broken
/// entry only affects the agent it belongs to.
#[derive(Debug, Clone)]
pub struct Registry {
    pub settings: Settings,
    agents: BTreeMap<String, RawAgentEntry>,
}

impl Registry {
    pub(crate) fn new_unchecked(settings: Settings, agents: BTreeMap<String, RawAgentEntry>) -> Self {
        Self { settings, agents }
    }

    pub fn agent_names(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(|s| s.as_str())
    }

    pub fn raw_agents(&self) -> &BTreeMap<String, RawAgentEntry> {
        &self.agents
    }

    pub fn raw_agent(&self, name: &str) -> Option<&RawAgentEntry> {
        self.agents.get(name)
    }
}

/// Validated `[settings]`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub runtime: Option<ContainerRuntime>,
    pub image: String,
    pub state_dir: PathBuf,
    pub bootstrap_prompt: String,
    pub always_on_prompt: String,
    pub stream: bool,
    pub backoff: BackoffPolicy,
}

/// Immutable per-agent configuration, held for a loop's whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub name: String,
    pub workspace: PathBuf,
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub env: BTreeMap<String, String>,
    pub init: Vec<String>,
    pub triggers: Vec<TriggerSpec>,
    pub post_run: Vec<String>,
}

impl AgentConfig {
    /// Minimal agent with only a workspace, as produced by the shorthand
    /// registry form.
    pub fn new(name: impl Into<String>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            workspace: workspace.into(),
            prompt: None,
            model: None,
            env: BTreeMap::new(),
            init: Vec::new(),
            triggers: Vec::new(),
            post_run: Vec::new(),
        }
    }

    pub fn has_triggers(&self) -> bool {
        !self.triggers.is_empty()
    }
}

/// A configured trigger. Closed set: adding a kind means adding a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerSpec {
    Poll(PollSpec),
    Script(ScriptSpec),
}

impl TriggerSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            TriggerSpec::Poll(_) => "poll",
            TriggerSpec::Script(_) => "script",
        }
    }

    /// Stable label used in logs, e.g. `script#1`.
    pub fn label(&self, index: usize) -> String {
        format!("{}#{}", self.kind(), index)
    }
}

/// Long-poll against a coordinator inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSpec {
    /// Coordinator base URL.
    pub url: String,
    /// Inbox identity; defaults to the agent name.
    pub agent_id: Option<String>,
    pub token: Option<String>,
    /// Server-side wait budget for one long-poll request.
    pub wait: Duration,
    /// Recheck interval once the coordinator only supports short polling.
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSpec {
    pub command: String,
}
