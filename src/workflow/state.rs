//! Per-run execution state

use super::loop_stack::LoopStack;
use crate::config::Job;
use crate::template::Model;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// State of one `run_job` or `run_sub_workflow` call
///
/// Created fresh for every call and dropped when the call returns, so
/// nothing leaks between runs on the same engine.
#[derive(Debug)]
pub struct RunState {
    /// Job being executed
    pub job: Arc<Job>,

    /// Instruction pointer
    pub index: usize,

    /// Data context for tokens and handlers
    pub model: Model,

    /// Open loops
    pub stack: LoopStack,

    /// Non-disabled actions executed so far
    pub steps: u64,

    /// Handler errors swallowed by `continue_on_error`
    pub recovered: u64,

    /// Sub-workflow nesting level; 0 for a top-level job
    pub depth: usize,

    started_at: Instant,
}

impl RunState {
    pub fn new(job: Arc<Job>, model: Model, depth: usize) -> Self {
        Self {
            job,
            index: 0,
            model,
            stack: LoopStack::new(),
            steps: 0,
            recovered: 0,
            depth,
            started_at: Instant::now(),
        }
    }

    /// True while the instruction pointer is inside the action list
    pub fn in_bounds(&self) -> bool {
        self.index < self.job.actions.len()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Consume the state into a summary
    pub fn finish(self, outcome: RunOutcome) -> RunSummary {
        RunSummary {
            job: self.job.key.clone(),
            outcome,
            steps: self.steps,
            recovered: self.recovered,
            duration: self.elapsed(),
            vars: self.model.into_vars(),
        }
    }
}

/// How a clean run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// Ran past the last action
    Completed,
    /// Stopped by `end` or a handler returning `Control::End`
    Ended,
}

/// Result of a clean run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Job key
    pub job: String,

    pub outcome: RunOutcome,

    /// Non-disabled actions executed
    pub steps: u64,

    /// Handler errors swallowed by `continue_on_error`
    pub recovered: u64,

    /// Wall-clock time of the run
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,

    /// Model vars at the end of the run
    pub vars: BTreeMap<String, serde_json::Value>,
}

impl RunSummary {
    /// Final value of a var
    pub fn var(&self, name: &str) -> Option<&serde_json::Value> {
        self.vars.get(name)
    }

    pub fn ended_early(&self) -> bool {
        self.outcome == RunOutcome::Ended
    }
}

fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Action;

    fn create_test_job() -> Arc<Job> {
        Arc::new(Job::new(
            "test",
            vec![Action::new("a", "print;one"), Action::new("b", "end")],
        ))
    }

    #[test]
    fn test_state_creation() {
        let state = RunState::new(create_test_job(), Model::new(), 0);
        assert_eq!(state.index, 0);
        assert_eq!(state.steps, 0);
        assert!(state.stack.is_empty());
        assert!(state.in_bounds());
    }

    #[test]
    fn test_in_bounds() {
        let mut state = RunState::new(create_test_job(), Model::new(), 0);
        state.index = 2;
        assert!(!state.in_bounds());
    }

    #[test]
    fn test_finish_summary() {
        let mut model = Model::new();
        model.set_var("result", "ok");
        let mut state = RunState::new(create_test_job(), model, 1);
        state.steps = 2;
        state.recovered = 1;

        let summary = state.finish(RunOutcome::Ended);
        assert_eq!(summary.job, "test");
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.recovered, 1);
        assert!(summary.ended_early());
        assert_eq!(summary.var("result"), Some(&serde_json::json!("ok")));
        assert!(summary.var("missing").is_none());
    }

    #[test]
    fn test_summary_serializes() {
        let state = RunState::new(create_test_job(), Model::new(), 0);
        let summary = state.finish(RunOutcome::Completed);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["outcome"], "completed");
        assert_eq!(json["job"], "test");
        assert!(json["duration"].is_u64());
    }
}
