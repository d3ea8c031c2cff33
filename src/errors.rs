// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentLoopError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Trigger '{trigger}' is misconfigured: {reason}")]
    TriggerConfig { trigger: String, reason: String },

    #[error("Agent has no triggers to race")]
    NoTriggers,

    #[error("Every trigger aborted before any of them fired")]
    AllTriggersFailed,

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AgentLoopError>;
