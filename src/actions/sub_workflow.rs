//! `sub-workflow` action - runs another job as a nested call

use super::config_str;
use crate::workflow::{ActionContext, ActionHandler, Control, Engine, HandlerResult};
use anyhow::{Context, anyhow, bail};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// `sub-workflow;<job>`
///
/// Config keys:
/// - `inputs`: table of inputs; string values are resolved as tokens first
/// - `register`: var that receives the child's final vars as an object
#[derive(Debug, Default, Clone, Copy)]
pub struct SubWorkflowAction;

impl ActionHandler for SubWorkflowAction {
    fn execute(&self, engine: &mut Engine, ctx: &mut ActionContext<'_>) -> HandlerResult {
        let job = ctx
            .arg(0)
            .map(str::trim)
            .filter(|job| !job.is_empty())
            .ok_or_else(|| anyhow!("sub-workflow needs a job key: sub-workflow;<job>"))?
            .to_string();

        let inputs = match ctx.config("inputs") {
            None => BTreeMap::new(),
            Some(JsonValue::Object(table)) => {
                let mut inputs = BTreeMap::new();
                for (name, value) in table {
                    let value = match value {
                        JsonValue::String(token) => JsonValue::String(
                            engine
                                .resolve(token, ctx.model)
                                .with_context(|| format!("resolving input '{}'", name))?,
                        ),
                        other => other.clone(),
                    };
                    inputs.insert(name.clone(), value);
                }
                inputs
            }
            Some(other) => bail!("config 'inputs' must be a table, got {}", other),
        };

        let summary = engine.run_sub_workflow(&job, inputs)?;

        if let Some(var) = config_str(ctx, "register")? {
            let vars = summary.vars.into_iter().collect::<serde_json::Map<_, _>>();
            ctx.model.set_var(var, JsonValue::Object(vars));
        }
        Ok(Control::Continue)
    }
}
