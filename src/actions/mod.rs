//! Built-in action handlers
//!
//! `shell`, `set` and `sub-workflow` are registered by [`default_registry`].
//! Applications add their own handlers to the same registry before running.

mod set;
mod shell;
mod sub_workflow;

pub use set::SetAction;
pub use shell::ShellAction;
pub use sub_workflow::SubWorkflowAction;

use crate::workflow::{ActionContext, ActionRegistry, RegistryError};
use anyhow::bail;

/// Add the built-in handlers to a registry
pub fn register_defaults(registry: &mut ActionRegistry) -> Result<(), RegistryError> {
    registry.register("shell", ShellAction)?;
    registry.register("set", SetAction)?;
    registry.register("sub-workflow", SubWorkflowAction)?;
    Ok(())
}

/// Registry holding only the built-in handlers
pub fn default_registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    register_defaults(&mut registry)
        .expect("built-in handler names are distinct and not reserved operators");
    registry
}

/// String config value; a non-string value is an error
pub(crate) fn config_str(ctx: &ActionContext<'_>, key: &str) -> anyhow::Result<Option<String>> {
    match ctx.config(key) {
        None => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => bail!("config '{}' must be a string, got {}", key, other),
    }
}
