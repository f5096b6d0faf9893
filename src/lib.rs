//! actionflow - an action-list workflow engine
//!
//! A job is a flat list of actions interpreted like instructions: `for`/`next`
//! loops, `goto` jumps, `end`, `wait`, `print` and `error` are handled by the
//! engine, everything else is dispatched to a registered [`ActionHandler`].
//! Handler failures go through each action's `continue_on_error` and `fail`
//! policy.

pub mod actions;
pub mod cli;
pub mod config;
pub mod logging;
pub mod template;
pub mod workflow;

pub use actions::default_registry;
pub use config::{Action, Job, Manifest, Settings};
pub use workflow::{
    ActionContext, ActionHandler, ActionRegistry, Control, Engine, EngineError, HandlerResult,
    RunOutcome, RunSummary,
};
