// src/engine/mod.rs

//! Agent loop controller.
//!
//! The pure state machine lives in [`core`]; the async/IO shell that races
//! triggers and launches execution units is implemented in [`runtime`].

pub mod core;
pub mod runtime;

pub use core::{LoopCommand, LoopCore, LoopEvent, LoopOptions, LoopState, LoopStep};
pub use runtime::AgentLoop;
