//! Name-keyed registry of action handlers

use super::command::BUILTIN_OPERATORS;
use super::engine::Engine;
use crate::config::Action;
use crate::template::Model;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{Level, event};

/// What a handler asks the engine to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Move on to the next action
    Continue,
    /// Stop the job cleanly; remaining actions are not visited
    End,
}

/// Result every handler returns
pub type HandlerResult = anyhow::Result<Control>;

/// Everything a handler sees about the action it is running
pub struct ActionContext<'a> {
    /// The action definition
    pub action: &'a Action,

    /// Lower-cased operator name the handler was found under
    pub name: &'a str,

    /// Resolved arguments after the operator
    pub args: &'a [String],

    /// The run's model; changes are visible to later actions
    pub model: &'a mut Model,
}

impl ActionContext<'_> {
    /// Positional argument, if present
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Raw config value
    pub fn config(&self, key: &str) -> Option<&JsonValue> {
        self.action.config.get(key)
    }
}

/// A registered action implementation
pub trait ActionHandler: Send + Sync {
    fn execute(&self, engine: &mut Engine, ctx: &mut ActionContext<'_>) -> HandlerResult;
}

struct FnHandler<F>(F);

impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(&mut Engine, &mut ActionContext<'_>) -> HandlerResult + Send + Sync,
{
    fn execute(&self, engine: &mut Engine, ctx: &mut ActionContext<'_>) -> HandlerResult {
        (self.0)(engine, ctx)
    }
}

/// Errors raised while populating a registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("'{name}' is a built-in operator and cannot be registered")]
    Reserved { name: String },

    #[error("a handler named '{name}' is already registered")]
    Duplicate { name: String },

    #[error("handler names cannot be empty or contain ';'")]
    InvalidName,
}

/// Action name → handler lookup table
///
/// Populated before any run; the engine only reads it.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `name` (case-insensitive)
    pub fn register<H>(&mut self, name: &str, handler: H) -> Result<(), RegistryError>
    where
        H: ActionHandler + 'static,
    {
        let name = name.trim().to_lowercase();
        if name.is_empty() || name.contains(';') {
            return Err(RegistryError::InvalidName);
        }
        if BUILTIN_OPERATORS.contains(&name.as_str()) {
            return Err(RegistryError::Reserved { name });
        }
        if self.handlers.contains_key(&name) {
            return Err(RegistryError::Duplicate { name });
        }

        event!(Level::DEBUG, action = %name, "Registering action handler");
        self.handlers.insert(name, Arc::new(handler));
        Ok(())
    }

    /// Register a closure as a handler
    pub fn register_fn<F>(&mut self, name: &str, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(&mut Engine, &mut ActionContext<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(name, FnHandler(handler))
    }

    /// Handler registered under `name`
    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(&name.to_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(&name.to_lowercase())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
