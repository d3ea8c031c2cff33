// src/config/mod.rs

//! Agent registry loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a registry file from disk (`loader.rs`).
//! - Validate settings, agents and trigger specs (`validate.rs`).
//! - Parse duration strings used throughout the registry (`duration.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    AgentConfig, PollSpec, RawAgentConfig, RawAgentEntry, RawRegistry, RawSettings,
    RawTriggerSpec, Registry, ScriptSpec, Settings, TriggerSpec,
};
