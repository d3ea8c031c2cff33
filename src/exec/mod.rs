// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] provides the `ExecutionBackend` trait the runner launches
//!   units through, so tests can swap in a fake.
//! - [`container`] is the production backend (`docker run` / `finch run`).
//! - [`runner`] wraps a backend with the handoff reset/read protocol.
//! - [`hooks`] runs the best-effort post-run commands.
//! - [`shell`] holds the shell spawning helpers shared with script triggers.

pub mod backend;
pub mod container;
pub mod hooks;
pub mod runner;
pub mod shell;

pub use backend::{ExecutionBackend, ExecutionRequest, ExecutionStatus};
pub use container::ContainerBackend;
pub use hooks::{HookReport, run_post_run_hooks};
pub use runner::{ExecutionRecord, ExecutionUnitRunner};
