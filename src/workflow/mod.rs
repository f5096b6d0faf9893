//! Job execution engine for actionflow
//!
//! This module handles:
//! - The dispatch loop over a job's action list
//! - `for`/`next` loops, `goto`, `end`, `wait`, `print` and `error`
//! - Failure handling (`continue_on_error`, `fail = "goto;<label>"`)
//! - Sub-workflow calls with bound inputs
//!
//! # Example
//!
//! ```ignore
//! use actionflow::actions::default_registry;
//! use actionflow::config::Manifest;
//! use actionflow::workflow::Engine;
//! use std::path::Path;
//!
//! let manifest = Manifest::load(Path::new("release.toml"))?;
//! let mut engine = Engine::new(manifest, default_registry());
//!
//! let summary = engine.run_job("main")?;
//! println!("ran {} actions", summary.steps);
//! ```

mod command;
mod engine;
mod error;
mod loop_stack;
mod registry;
mod state;

pub use command::{BUILTIN_OPERATORS, Command, FailDirective, split_action};
pub use engine::{Engine, Hook};
pub use error::EngineError;
pub use loop_stack::{LoopError, LoopFrame, LoopStack, MAX_LOOP_DEPTH};
pub use registry::{
    ActionContext, ActionHandler, ActionRegistry, Control, HandlerResult, RegistryError,
};
pub use state::{RunOutcome, RunState, RunSummary};
