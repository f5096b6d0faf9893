//! Job execution engine - interprets a job's action list

use super::command::{Command, FailDirective};
use super::error::EngineError;
use super::registry::{ActionContext, ActionRegistry, Control};
use super::state::{RunOutcome, RunState, RunSummary};
use crate::cli::output::{OutputHandler, ProgressEvent, QuietHandler};
use crate::config::{Action, EngineSettings, Job, Manifest};
use crate::template::{Model, TemplateEngine, TemplateError, TokenResolver};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Callback run around top-level jobs
pub type Hook = Arc<dyn Fn(&mut Engine) -> anyhow::Result<()> + Send + Sync>;

/// Where the instruction pointer goes after an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    Jump(usize),
    End,
}

/// Runs jobs from a manifest
///
/// One engine runs one job at a time: `run_job` and `run_sub_workflow` take
/// `&mut self`. Handlers get the engine back, so a handler can start a
/// sub-workflow, which runs with its own [`RunState`] and returns before the
/// caller's loop continues.
pub struct Engine {
    manifest: Arc<Manifest>,
    registry: Arc<ActionRegistry>,
    resolver: Box<dyn TokenResolver>,
    output: Arc<dyn OutputHandler>,
    settings: EngineSettings,
    globals: BTreeMap<String, JsonValue>,
    init_hook: Option<Hook>,
    cleanup_hook: Option<Hook>,
    depth: usize,
}

impl Engine {
    /// Create an engine with the minijinja resolver and quiet output
    pub fn new(manifest: Manifest, registry: ActionRegistry) -> Self {
        Self {
            manifest: Arc::new(manifest),
            registry: Arc::new(registry),
            resolver: Box::new(TemplateEngine::new()),
            output: Arc::new(QuietHandler),
            settings: EngineSettings::default(),
            globals: BTreeMap::new(),
            init_hook: None,
            cleanup_hook: None,
            depth: 0,
        }
    }

    pub fn with_resolver(mut self, resolver: impl TokenResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_output(mut self, output: Arc<dyn OutputHandler>) -> Self {
        self.output = output;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Run before every top-level job
    pub fn with_init_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Engine) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.init_hook = Some(Arc::new(hook));
        self
    }

    /// Run after every top-level job, whatever its outcome
    pub fn with_cleanup_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Engine) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.cleanup_hook = Some(Arc::new(hook));
        self
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn output(&self) -> &dyn OutputHandler {
        self.output.as_ref()
    }

    /// Set a var seeded into every subsequent run's model
    pub fn set_global(&mut self, name: impl Into<String>, value: impl Into<JsonValue>) {
        self.globals.insert(name.into(), value.into());
    }

    pub fn globals(&self) -> &BTreeMap<String, JsonValue> {
        &self.globals
    }

    /// Sub-workflow nesting level of the run in progress
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Resolve a token with the engine's resolver
    pub fn resolve(&self, token: &str, model: &Model) -> Result<String, TemplateError> {
        self.resolver.resolve(token, model)
    }

    pub fn resolve_bool(&self, token: &str, model: &Model) -> Result<bool, TemplateError> {
        self.resolver.resolve_bool(token, model)
    }

    /// Run a job with the init and cleanup hooks around it
    pub fn run_job(&mut self, key: &str) -> Result<RunSummary, EngineError> {
        let job = self
            .manifest
            .job(key)
            .ok_or_else(|| EngineError::JobNotFound { job: key.to_string() })?;

        let result = match self.run_hook("init", self.init_hook.clone()) {
            Ok(()) => {
                let model = self.base_model();
                self.execute(job, model)
            }
            Err(err) => {
                tracing::error!(job = %key, error = %err, "Init hook failed");
                Err(err)
            }
        };

        let cleanup = self.run_hook("cleanup", self.cleanup_hook.clone());

        match (result, cleanup) {
            (Ok(summary), Ok(())) => Ok(summary),
            (Ok(_), Err(hook_err)) => {
                tracing::error!(job = %key, error = %hook_err, "Cleanup hook failed");
                Err(hook_err)
            }
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(hook_err)) => {
                tracing::warn!(
                    job = %key,
                    error = %hook_err,
                    "Cleanup hook failed after the job had already failed"
                );
                Err(err)
            }
        }
    }

    /// Run a sub-workflow job with bound inputs; hooks are not run
    pub fn run_sub_workflow(
        &mut self,
        key: &str,
        inputs: BTreeMap<String, JsonValue>,
    ) -> Result<RunSummary, EngineError> {
        let job = self
            .manifest
            .job(key)
            .ok_or_else(|| EngineError::JobNotFound { job: key.to_string() })?;

        if !job.is_sub_workflow {
            return Err(EngineError::NotSubWorkflow { job: key.to_string() });
        }

        let max = self.settings.max_sub_workflow_depth;
        if self.depth >= max {
            return Err(EngineError::SubWorkflowDepth { max });
        }

        let mut model = self.base_model();
        bind_inputs(&job, inputs, &mut model)?;

        self.depth += 1;
        let result = self.execute(job, model);
        self.depth -= 1;
        result
    }

    fn base_model(&self) -> Model {
        let mut vars = self.manifest.vars.clone();
        vars.extend(self.globals.iter().map(|(k, v)| (k.clone(), v.clone())));
        Model::with_vars(vars)
    }

    fn run_hook(&mut self, name: &'static str, hook: Option<Hook>) -> Result<(), EngineError> {
        let Some(hook) = hook else {
            return Ok(());
        };
        tracing::debug!(hook = name, "Running hook");
        hook(self).map_err(|source| EngineError::Hook { hook: name, source })
    }

    fn execute(&mut self, job: Arc<Job>, mut model: Model) -> Result<RunSummary, EngineError> {
        let span = tracing::info_span!("job", job = %job.key, depth = self.depth);
        let _guard = span.enter();

        model.set_job(job.key.clone());
        let mut state = RunState::new(job, model, self.depth);

        tracing::info!(
            job = %state.job.key,
            actions = state.job.actions.len(),
            depth = state.depth,
            "Starting job"
        );
        self.report(ProgressEvent::JobStart {
            job: state.job.key.clone(),
            actions: state.job.actions.len(),
            depth: state.depth,
        });

        match self.dispatch(&mut state) {
            Ok(outcome) => {
                let summary = state.finish(outcome);
                tracing::info!(
                    job = %summary.job,
                    steps = summary.steps,
                    recovered = summary.recovered,
                    duration_ms = summary.duration.as_millis() as u64,
                    "Finished job"
                );
                self.report(ProgressEvent::JobComplete {
                    job: summary.job.clone(),
                    ended: summary.ended_early(),
                    steps: summary.steps,
                    duration_ms: summary.duration.as_millis() as u64,
                });
                Ok(summary)
            }
            Err(err) => {
                tracing::error!(
                    job = %state.job.key,
                    index = state.index,
                    error = %err,
                    "Job failed"
                );
                self.report(ProgressEvent::JobError {
                    job: state.job.key.clone(),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn dispatch(&mut self, state: &mut RunState) -> Result<RunOutcome, EngineError> {
        while state.in_bounds() {
            let job = Arc::clone(&state.job);
            let action = &job.actions[state.index];

            match self.step(state, action)? {
                Flow::Next => state.index += 1,
                Flow::Jump(target) => state.index = target,
                Flow::End => return Ok(RunOutcome::Ended),
            }
        }
        Ok(RunOutcome::Completed)
    }

    fn step(&mut self, state: &mut RunState, action: &Action) -> Result<Flow, EngineError> {
        let index = state.index;
        state.model.set_action(action);

        if self.resolver.resolve_bool(&action.disabled, &state.model)? {
            tracing::debug!(job = %state.job.key, index, key = %action.key, "Action disabled");
            self.report(ProgressEvent::ActionSkipped {
                job: state.job.key.clone(),
                index,
                key: action.key.clone(),
            });
            return Ok(Flow::Next);
        }

        state.steps += 1;
        if let Some(limit) = self.settings.max_steps {
            if state.steps > limit {
                return Err(EngineError::StepLimit { limit });
            }
        }

        let resolved = self.resolver.resolve(&action.action, &state.model)?;
        if resolved.trim().is_empty() {
            return Err(EngineError::EmptyAction { index });
        }
        let command = Command::parse(&resolved)?;

        tracing::debug!(
            job = %state.job.key,
            index,
            key = %action.key,
            command = command.name(),
            action = %resolved,
            "Executing action"
        );
        self.report(ProgressEvent::ActionStart {
            job: state.job.key.clone(),
            index,
            key: action.key.clone(),
            action: resolved.clone(),
        });

        let flow = match command {
            Command::For { variable, from, to } => self.enter_loop(state, variable, from, to)?,
            Command::Next => self.next_iteration(state)?,
            Command::End => Flow::End,
            Command::Error { message } => return Err(EngineError::UserError { message }),
            Command::Print { text } => {
                self.output.print(&text);
                Flow::Next
            }
            Command::Goto { label } => self.jump(state, &label)?,
            Command::Wait { duration } => {
                self.report(ProgressEvent::Wait {
                    job: state.job.key.clone(),
                    seconds: duration.as_secs(),
                });
                std::thread::sleep(duration);
                Flow::Next
            }
            Command::Invoke { name, args } => self.invoke(state, action, &name, &args)?,
        };

        self.report(ProgressEvent::ActionComplete {
            job: state.job.key.clone(),
            index,
            key: action.key.clone(),
        });
        Ok(flow)
    }

    fn enter_loop(
        &self,
        state: &mut RunState,
        variable: String,
        from: i64,
        to: i64,
    ) -> Result<Flow, EngineError> {
        let index = state.index;

        if from > to {
            let next = state
                .job
                .matching_next(index)
                .ok_or(EngineError::UnmatchedFor { index })?;
            tracing::debug!(job = %state.job.key, index, from, to, "Empty loop range, skipping body");
            return Ok(Flow::Jump(next + 1));
        }

        if state.stack.frames().iter().any(|f| f.index == index) {
            tracing::debug!(job = %state.job.key, index, variable = %variable, "Restarting open loop");
        }
        state.stack.push(variable.clone(), index, from, to)?;
        state.model.sync_loops(&state.stack);
        self.report(ProgressEvent::LoopEnter {
            job: state.job.key.clone(),
            variable,
            from,
            to,
        });
        Ok(Flow::Next)
    }

    fn next_iteration(&self, state: &mut RunState) -> Result<Flow, EngineError> {
        let finished = state.stack.increment()?;

        if finished {
            let frame = state.stack.pop()?;
            state.model.sync_loops(&state.stack);
            self.report(ProgressEvent::LoopExit {
                job: state.job.key.clone(),
                variable: frame.variable_name,
            });
            return Ok(Flow::Next);
        }

        let target = state.stack.peek()?.index + 1;
        state.model.sync_loops(&state.stack);
        Ok(Flow::Jump(target))
    }

    fn jump(&self, state: &RunState, label: &str) -> Result<Flow, EngineError> {
        let target = state
            .job
            .key_index(label)
            .ok_or_else(|| EngineError::LabelNotFound {
                job: state.job.key.clone(),
                label: label.to_string(),
            })?;

        tracing::debug!(job = %state.job.key, from = state.index, to = target, label, "Jumping");
        self.report(ProgressEvent::Jump {
            job: state.job.key.clone(),
            from: state.index,
            label: label.to_string(),
            to: target,
        });
        Ok(Flow::Jump(target))
    }

    fn invoke(
        &mut self,
        state: &mut RunState,
        action: &Action,
        name: &str,
        args: &[String],
    ) -> Result<Flow, EngineError> {
        let handler = self
            .registry
            .get(name)
            .ok_or_else(|| EngineError::UnknownAction {
                action: name.to_string(),
            })?;

        let mut ctx = ActionContext {
            action,
            name,
            args,
            model: &mut state.model,
        };

        match handler.execute(self, &mut ctx) {
            Ok(Control::Continue) => Ok(Flow::Next),
            Ok(Control::End) => Ok(Flow::End),
            Err(source) => match source.downcast::<EngineError>() {
                // Raised by a nested engine call; never subject to the failure policy
                Ok(err) if err.bypasses_failure_policy() => Err(err),
                Ok(err) => self.handle_failure(state, action, name, err.into()),
                Err(source) => self.handle_failure(state, action, name, source),
            },
        }
    }

    /// Apply `continue_on_error` and `fail` to a handler error
    fn handle_failure(
        &self,
        state: &mut RunState,
        action: &Action,
        name: &str,
        source: anyhow::Error,
    ) -> Result<Flow, EngineError> {
        if self
            .resolver
            .resolve_bool(&action.continue_on_error, &state.model)?
        {
            let error = format!("{:#}", source);
            tracing::warn!(
                job = %state.job.key,
                index = state.index,
                key = %action.key,
                action = name,
                error = %error,
                "Action failed, continuing"
            );
            state.recovered += 1;
            self.report(ProgressEvent::ActionRecovered {
                job: state.job.key.clone(),
                index: state.index,
                key: action.key.clone(),
                error,
            });
            return Ok(Flow::Next);
        }

        let directive = self.resolver.resolve(&action.fail, &state.model)?;
        match FailDirective::parse(&directive)? {
            FailDirective::End => Err(EngineError::Handler {
                action: name.to_string(),
                source,
            }),
            FailDirective::Goto { label } => {
                let error = format!("{:#}", source);
                tracing::warn!(
                    job = %state.job.key,
                    index = state.index,
                    action = name,
                    label = %label,
                    error = %error,
                    "Action failed, jumping to fail label"
                );
                self.jump(state, &label)
            }
        }
    }

    fn report(&self, event: ProgressEvent) {
        if event.verbosity() <= self.settings.verbosity {
            self.output.emit(event);
        }
    }
}

/// Bind call inputs onto a sub-workflow model
///
/// Declared inputs fall back to their defaults; undeclared ones are bound
/// as given.
fn bind_inputs(
    job: &Job,
    mut given: BTreeMap<String, JsonValue>,
    model: &mut Model,
) -> Result<(), EngineError> {
    for (name, def) in &job.inputs {
        match given.remove(name).or_else(|| def.default.clone()) {
            Some(value) => model.set_input(name.clone(), value),
            None if def.required => {
                return Err(EngineError::MissingInput {
                    job: job.key.clone(),
                    input: name.clone(),
                });
            }
            None => {}
        }
    }

    for (name, value) in given {
        model.set_input(name, value);
    }
    Ok(())
}
