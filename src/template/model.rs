//! Run model exposed to token resolution and handlers

use crate::config::Action;
use crate::workflow::LoopStack;
use minijinja::value::{Enumerator, Object, Value};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Data context of a single run
///
/// Templates can address `action`, `job`, `vars`, `inputs`, `loop` and `env`.
/// A bare name resolves to a loop counter first, then a var, then an input,
/// so `{{ i }}` works inside `for;i;0;3`.
///
/// The collections sit behind `Arc` so a render snapshot shares them; writes
/// copy only while a snapshot is still alive.
#[derive(Debug, Clone, Default)]
pub struct Model {
    job: Option<String>,
    action: Option<Arc<Action>>,
    vars: Arc<BTreeMap<String, JsonValue>>,
    inputs: Arc<BTreeMap<String, JsonValue>>,
    loops: Arc<BTreeMap<String, i64>>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model seeded with shared vars
    pub fn with_vars(vars: BTreeMap<String, JsonValue>) -> Self {
        Self {
            vars: Arc::new(vars),
            ..Default::default()
        }
    }

    /// Key of the job being run
    pub fn job(&self) -> Option<&str> {
        self.job.as_deref()
    }

    pub fn set_job(&mut self, job: impl Into<String>) {
        self.job = Some(job.into());
    }

    /// Action currently executing
    pub fn action(&self) -> Option<&Action> {
        self.action.as_deref()
    }

    /// Bind the action the engine is about to run
    pub fn set_action(&mut self, action: &Action) {
        self.action = Some(Arc::new(action.clone()));
    }

    /// Shared data, readable and writable by handlers
    pub fn vars(&self) -> &BTreeMap<String, JsonValue> {
        &self.vars
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<JsonValue>) {
        Arc::make_mut(&mut self.vars).insert(name.into(), value.into());
    }

    pub fn var(&self, name: &str) -> Option<&JsonValue> {
        self.vars.get(name)
    }

    /// Take the vars out of a finished run
    pub fn into_vars(self) -> BTreeMap<String, JsonValue> {
        Arc::unwrap_or_clone(self.vars)
    }

    /// Parameters bound by a sub-workflow call
    pub fn inputs(&self) -> &BTreeMap<String, JsonValue> {
        &self.inputs
    }

    pub fn set_input(&mut self, name: impl Into<String>, value: impl Into<JsonValue>) {
        Arc::make_mut(&mut self.inputs).insert(name.into(), value.into());
    }

    pub fn input(&self, name: &str) -> Option<&JsonValue> {
        self.inputs.get(name)
    }

    /// Current value of a loop counter, innermost winning on name clashes
    pub fn loop_counter(&self, name: &str) -> Option<i64> {
        self.loops.get(name).copied()
    }

    /// Mirror the open loop frames into the model
    pub fn sync_loops(&mut self, stack: &LoopStack) {
        let loops = Arc::make_mut(&mut self.loops);
        loops.clear();
        for frame in stack.frames() {
            loops.insert(frame.variable_name.clone(), frame.current_value);
        }
    }

    /// Convert to a minijinja Value for rendering
    pub fn to_value(&self) -> Value {
        Value::from_object(ModelObject(self.clone()))
    }

    /// Top-level names for error suggestions
    pub fn known_variables(&self) -> Vec<&str> {
        let mut names = vec!["action", "job", "vars", "inputs", "loop", "env"];
        names.extend(self.loops.keys().map(String::as_str));
        names.extend(self.vars.keys().map(String::as_str));
        names.extend(self.inputs.keys().map(String::as_str));
        names
    }
}

#[derive(Debug)]
struct ModelObject(Model);

impl Object for ModelObject {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let model = &self.0;
        match key.as_str()? {
            "action" => model
                .action
                .as_ref()
                .map(|a| Value::from_object(ActionObject(Arc::clone(a)))),
            "job" => model.job.as_ref().map(|j| Value::from(j.clone())),
            "vars" => Some(Value::from_serialize(&*model.vars)),
            "inputs" => Some(Value::from_serialize(&*model.inputs)),
            "loop" => Some(Value::from_iter(
                model.loops.iter().map(|(k, v)| (k.clone(), Value::from(*v))),
            )),
            "env" => Some(Value::from_object(EnvObject)),
            name => model
                .loops
                .get(name)
                .map(|v| Value::from(*v))
                .or_else(|| model.vars.get(name).map(Value::from_serialize))
                .or_else(|| model.inputs.get(name).map(Value::from_serialize)),
        }
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(&["action", "job", "vars", "inputs", "loop", "env"])
    }
}

/// Read-only view of the running action
#[derive(Debug)]
struct ActionObject(Arc<Action>);

impl Object for ActionObject {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let action = &self.0;
        match key.as_str()? {
            "key" => Some(Value::from(action.key.clone())),
            "action" => Some(Value::from(action.action.clone())),
            "description" => Some(Value::from(action.description.clone())),
            "config" => Some(Value::from_serialize(&action.config)),
            _ => None,
        }
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(&["key", "action", "description", "config"])
    }
}

/// Lazy environment variable access
#[derive(Debug, Clone, Copy)]
struct EnvObject;

impl Object for EnvObject {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        std::env::var(key.as_str()?).ok().map(Value::from)
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Empty
    }
}
