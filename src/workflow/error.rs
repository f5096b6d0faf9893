//! Errors returned by job runs

use super::loop_stack::LoopError;
use crate::template::TemplateError;
use thiserror::Error;

/// Why a run stopped with a failure
#[derive(Debug, Error)]
pub enum EngineError {
    // Lookup errors
    #[error("cannot find job {job}")]
    JobNotFound { job: String },

    #[error("job {job} is not a sub-workflow and cannot be called from another job")]
    NotSubWorkflow { job: String },

    #[error("cannot find label {label} in job {job}")]
    LabelNotFound { job: String, label: String },

    #[error("no handler registered for action '{action}'")]
    UnknownAction { action: String },

    #[error("job {job} requires input '{input}'")]
    MissingInput { job: String, input: String },

    #[error("action '{action}' requires config value '{key}'")]
    MissingConfig { action: String, key: String },

    // Syntax errors
    #[error("empty action at index {index}")]
    EmptyAction { index: usize },

    #[error("not enough args for {command}: expected {expected}, got {found}")]
    NotEnoughArgs {
        command: String,
        expected: usize,
        found: usize,
    },

    #[error("value should be an int for {command}: '{value}'")]
    InvalidInteger { command: String, value: String },

    #[error("'for' at index {index} has no matching 'next'")]
    UnmatchedFor { index: usize },

    #[error("invalid fail directive '{directive}': expected 'end' or 'goto;<label>'")]
    InvalidFailDirective { directive: String },

    // Stack errors
    #[error("loop error: {0}")]
    Loop(#[from] LoopError),

    // User-directed errors
    #[error("{message}")]
    UserError { message: String },

    // Handler errors
    #[error("action '{action}' failed: {source}")]
    Handler {
        action: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("token resolution failed: {0}")]
    Template(#[from] TemplateError),

    #[error("{hook} hook failed: {source}")]
    Hook {
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },

    // Limits
    #[error("step limit of {limit} actions exceeded")]
    StepLimit { limit: u64 },

    #[error("sub-workflow nesting deeper than {max}")]
    SubWorkflowDepth { max: usize },
}

impl EngineError {
    /// True for errors that come from a malformed job rather than a run-time failure
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            EngineError::JobNotFound { .. }
                | EngineError::NotSubWorkflow { .. }
                | EngineError::LabelNotFound { .. }
                | EngineError::UnknownAction { .. }
                | EngineError::MissingInput { .. }
                | EngineError::EmptyAction { .. }
                | EngineError::NotEnoughArgs { .. }
                | EngineError::InvalidInteger { .. }
                | EngineError::UnmatchedFor { .. }
                | EngineError::InvalidFailDirective { .. }
                | EngineError::Loop(_)
        )
    }

    /// True for errors that abort the run even when a handler returns them
    ///
    /// `continue_on_error` and `fail` only apply to run-time failures; a
    /// malformed job or an exhausted limit stops every enclosing run.
    pub fn bypasses_failure_policy(&self) -> bool {
        self.is_definition_error()
            || matches!(
                self,
                EngineError::StepLimit { .. } | EngineError::SubWorkflowDepth { .. }
            )
    }
}
