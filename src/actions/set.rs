//! `set` action - writes a var into the run model

use crate::workflow::{ActionContext, ActionHandler, Control, Engine, HandlerResult};
use anyhow::bail;
use serde_json::Value as JsonValue;

/// `set;<name>;<value>`
///
/// The value is parsed as JSON when it parses (`3`, `true`, `[1,2]`),
/// otherwise stored as a string.
#[derive(Debug, Default, Clone, Copy)]
pub struct SetAction;

impl ActionHandler for SetAction {
    fn execute(&self, _engine: &mut Engine, ctx: &mut ActionContext<'_>) -> HandlerResult {
        let name = match ctx.arg(0).map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => bail!("set needs a var name: set;<name>;<value>"),
        };

        let raw = ctx.args.get(1..).unwrap_or_default().join(";");
        let value = serde_json::from_str::<JsonValue>(raw.trim())
            .unwrap_or_else(|_| JsonValue::String(raw));

        tracing::debug!(var = %name, value = %value, "Setting var");
        ctx.model.set_var(name, value);
        Ok(Control::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Manifest;
    use crate::workflow::{ActionRegistry, EngineError};

    fn run(toml: &str) -> Result<crate::workflow::RunSummary, EngineError> {
        let mut registry = ActionRegistry::new();
        registry.register("set", SetAction).unwrap();
        let mut engine = Engine::new(Manifest::from_toml(toml).unwrap(), registry);
        engine.run_job("main")
    }

    #[test]
    fn test_set_typed_values() {
        let summary = run(r#"
            [[jobs]]
            key = "main"
            actions = [
                { action = "set;count;3" },
                { action = "set;flag;true" },
                { action = "set;name;release v2" },
                { action = "set;list;[1,2]" },
                { action = "set;empty" },
            ]
        "#)
        .unwrap();

        assert_eq!(summary.var("count"), Some(&serde_json::json!(3)));
        assert_eq!(summary.var("flag"), Some(&serde_json::json!(true)));
        assert_eq!(summary.var("name"), Some(&serde_json::json!("release v2")));
        assert_eq!(summary.var("list"), Some(&serde_json::json!([1, 2])));
        assert_eq!(summary.var("empty"), Some(&serde_json::json!("")));
    }

    #[test]
    fn test_set_value_feeds_loop_bounds() {
        let summary = run(r#"
            [[jobs]]
            key = "main"
            actions = [
                { action = "set;total;0" },
                { action = "set;limit;2" },
                { action = "for;i;1;{{ vars.limit }}" },
                { action = "set;total;{{ vars.total + i }}" },
                { action = "next" },
            ]
        "#)
        .unwrap();

        assert_eq!(summary.var("total"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn test_set_without_name() {
        let err = run(r#"
            [[jobs]]
            key = "main"
            actions = [ { action = "set" } ]
        "#)
        .unwrap_err();
        assert!(matches!(err, EngineError::Handler { .. }));
    }
}
