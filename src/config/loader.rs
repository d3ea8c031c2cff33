// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawRegistry, Registry};
use crate::errors::Result;

/// Load a registry file from a given path and return the raw `RawRegistry`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawRegistry> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let registry: RawRegistry = toml::from_str(&contents)?;

    Ok(registry)
}

/// Load a registry file from path and validate its `[settings]`.
///
/// Individual agents are validated when resolved through
/// [`Registry::agent`].
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Registry> {
    let raw = load_from_path(&path)?;
    let registry = Registry::try_from(raw)?;
    Ok(registry)
}

/// Default state directory: `~/.claude-docker`.
pub fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claude-docker")
}

/// Default registry location: `agents.toml` inside the state directory.
pub fn default_config_path() -> PathBuf {
    default_state_dir().join("agents.toml")
}

/// Expand a leading `~` or `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let path = path.trim();
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn expand_home_only_touches_leading_tilde() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_home("rel/~/x"), PathBuf::from("rel/~/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/notes"), home.join("notes"));
            assert_eq!(expand_home("~"), home);
        }
    }

    #[test]
    fn loads_registry_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [settings]
            runtime = "finch"

            [agent]
            notes = "/srv/notes"
            "#
        )
        .unwrap();

        let registry = load_and_validate(file.path()).unwrap();
        assert_eq!(
            registry.settings.runtime,
            Some(crate::types::ContainerRuntime::Finch)
        );
        assert_eq!(registry.agent_names().collect::<Vec<_>>(), vec!["notes"]);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent\nbroken").unwrap();
        assert!(load_and_validate(file.path()).is_err());
    }
}
