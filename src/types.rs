use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Why an execution unit is being launched.
///
/// - `Bootstrap`: the mandatory first run of a trigger-based agent, using the
///   fixed bootstrap prompt.
/// - `Triggered`: a run caused by a trigger firing in the steady-state loop.
/// - `Once`: the single triggered run of `--once` debug mode.
/// - `AlwaysOn`: the legacy single run used for agents without triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Bootstrap,
    Triggered,
    Once,
    AlwaysOn,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Bootstrap => "bootstrap",
            RunMode::Triggered => "triggered",
            RunMode::Once => "once",
            RunMode::AlwaysOn => "always-on",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container CLI used to launch execution units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    Docker,
    Finch,
}

impl ContainerRuntime {
    pub fn binary(&self) -> &'static str {
        match self {
            ContainerRuntime::Docker => "docker",
            ContainerRuntime::Finch => "finch",
        }
    }

    /// Pick `docker` if it is on `PATH`, otherwise `finch`.
    pub fn detect() -> Option<Self> {
        let path = std::env::var_os("PATH")?;
        let on_path = |bin: &str| std::env::split_paths(&path).any(|dir| dir.join(bin).is_file());

        if on_path("docker") {
            Some(ContainerRuntime::Docker)
        } else if on_path("finch") {
            Some(ContainerRuntime::Finch)
        } else {
            None
        }
    }
}

impl FromStr for ContainerRuntime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "docker" => Ok(ContainerRuntime::Docker),
            "finch" => Ok(ContainerRuntime::Finch),
            other => Err(format!(
                "invalid container runtime: {other} (expected \"docker\" or \"finch\")"
            )),
        }
    }
}
