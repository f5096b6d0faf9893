//! Output handlers for job runs
//!
//! Supports console (pretty), JSON, and quiet output modes.

use crate::config::Verbosity;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Output mode for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Console,
    Json,
    Quiet,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "json" => Ok(Self::Json),
            "quiet" => Ok(Self::Quiet),
            other => Err(format!(
                "unknown output mode '{}' (expected console, json or quiet)",
                other
            )),
        }
    }
}

/// Events emitted during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    JobStart {
        job: String,
        actions: usize,
        depth: usize,
    },
    ActionStart {
        job: String,
        index: usize,
        key: String,
        action: String,
    },
    ActionSkipped {
        job: String,
        index: usize,
        key: String,
    },
    ActionComplete {
        job: String,
        index: usize,
        key: String,
    },
    ActionRecovered {
        job: String,
        index: usize,
        key: String,
        error: String,
    },
    LoopEnter {
        job: String,
        variable: String,
        from: i64,
        to: i64,
    },
    LoopExit {
        job: String,
        variable: String,
    },
    Jump {
        job: String,
        from: usize,
        label: String,
        to: usize,
    },
    Wait {
        job: String,
        seconds: u64,
    },
    JobComplete {
        job: String,
        ended: bool,
        steps: u64,
        duration_ms: u64,
    },
    JobError {
        job: String,
        error: String,
    },
}

impl ProgressEvent {
    /// Lowest verbosity at which this event is shown
    pub fn verbosity(&self) -> Verbosity {
        match self {
            ProgressEvent::JobError { .. } => Verbosity::Quiet,
            ProgressEvent::JobStart { .. }
            | ProgressEvent::JobComplete { .. }
            | ProgressEvent::ActionSkipped { .. }
            | ProgressEvent::ActionRecovered { .. } => Verbosity::Normal,
            _ => Verbosity::Verbose,
        }
    }
}

/// Output handler trait
pub trait OutputHandler: Send + Sync {
    /// Emit a progress event
    fn emit(&self, event: ProgressEvent);

    /// Write text produced by a `print` action
    fn print(&self, text: &str);
}

/// Console output handler
pub struct ConsoleHandler;

impl ConsoleHandler {
    fn format_duration(ms: u64) -> String {
        if ms < 1000 {
            format!("{}ms", ms)
        } else {
            format!("{:.1}s", ms as f64 / 1000.0)
        }
    }

    fn indent(depth: usize) -> String {
        "  ".repeat(depth)
    }
}

impl OutputHandler for ConsoleHandler {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::JobStart {
                job,
                actions,
                depth,
            } => {
                if depth == 0 {
                    eprintln!("Running job '{}' ({} actions)", job, actions);
                } else {
                    eprintln!("{}→ sub-workflow '{}'", Self::indent(depth), job);
                }
            }
            ProgressEvent::ActionStart {
                index, key, action, ..
            } => {
                if key.is_empty() {
                    eprintln!("  [{}] {}", index, action);
                } else {
                    eprintln!("  [{}] {} ({})", index, action, key);
                }
            }
            ProgressEvent::ActionSkipped { index, key, .. } => {
                eprintln!("  [{}] {} skipped (disabled)", index, key);
            }
            ProgressEvent::ActionComplete { .. } => {}
            ProgressEvent::ActionRecovered {
                index, key, error, ..
            } => {
                eprintln!("  [{}] {} failed, continuing: {}", index, key, error);
            }
            ProgressEvent::LoopEnter {
                variable, from, to, ..
            } => {
                eprintln!("  loop {} = {}..={}", variable, from, to);
            }
            ProgressEvent::LoopExit { variable, .. } => {
                eprintln!("  loop {} done", variable);
            }
            ProgressEvent::Jump {
                from, label, to, ..
            } => {
                eprintln!("  [{}] goto {} ({})", from, label, to);
            }
            ProgressEvent::Wait { seconds, .. } => {
                eprintln!("  waiting {}s", seconds);
            }
            ProgressEvent::JobComplete {
                job,
                ended,
                steps,
                duration_ms,
            } => {
                let how = if ended { "ended" } else { "completed" };
                eprintln!(
                    "✓ Job '{}' {} ({} actions in {})",
                    job,
                    how,
                    steps,
                    Self::format_duration(duration_ms)
                );
            }
            ProgressEvent::JobError { job, error } => {
                eprintln!("✗ Job '{}' failed: {}", job, error);
            }
        }
    }

    fn print(&self, text: &str) {
        println!("{}", text);
    }
}

/// JSON output handler, one event per line
pub struct JsonHandler {
    pretty: bool,
}

impl JsonHandler {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn print_json<T: Serialize>(&self, value: &T) {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };

        if let Ok(s) = json {
            println!("{}", s);
        }
    }
}

impl OutputHandler for JsonHandler {
    fn emit(&self, event: ProgressEvent) {
        self.print_json(&event);
    }

    fn print(&self, text: &str) {
        #[derive(Serialize)]
        struct Print<'a> {
            #[serde(rename = "type")]
            kind: &'static str,
            text: &'a str,
        }

        self.print_json(&Print {
            kind: "Print",
            text,
        });
    }
}

/// Handler that drops progress and keeps printed text and failures
pub struct QuietHandler;

impl OutputHandler for QuietHandler {
    fn emit(&self, event: ProgressEvent) {
        if let ProgressEvent::JobError { job, error } = event {
            eprintln!("✗ Job '{}' failed: {}", job, error);
        }
    }

    fn print(&self, text: &str) {
        println!("{}", text);
    }
}

/// Create an output handler based on mode
pub fn create_handler(mode: OutputMode) -> Arc<dyn OutputHandler> {
    match mode {
        OutputMode::Console => Arc::new(ConsoleHandler),
        OutputMode::Json => Arc::new(JsonHandler::new(false)),
        OutputMode::Quiet => Arc::new(QuietHandler),
    }
}

/// Handler that records everything, for tests and embedding
#[derive(Debug, Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<ProgressEvent>>,
    printed: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn printed(&self) -> Vec<String> {
        self.printed
            .lock()
            .map(|printed| printed.clone())
            .unwrap_or_default()
    }
}

impl OutputHandler for RecordingHandler {
    fn emit(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    fn print(&self, text: &str) {
        if let Ok(mut printed) = self.printed.lock() {
            printed.push(text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_mode_from_str() {
        assert_eq!("json".parse::<OutputMode>(), Ok(OutputMode::Json));
        assert_eq!("QUIET".parse::<OutputMode>(), Ok(OutputMode::Quiet));
        assert_eq!("console".parse::<OutputMode>(), Ok(OutputMode::Console));
        assert!("fancy".parse::<OutputMode>().is_err());
    }

    #[test]
    fn test_recording_handler_captures() {
        let handler = RecordingHandler::new();
        handler.emit(ProgressEvent::JobStart {
            job: "main".into(),
            actions: 3,
            depth: 0,
        });
        handler.print("hello");

        assert_eq!(handler.events().len(), 1);
        assert_eq!(handler.printed(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_event_verbosity() {
        let error = ProgressEvent::JobError {
            job: "main".into(),
            error: "boom".into(),
        };
        let skipped = ProgressEvent::ActionSkipped {
            job: "main".into(),
            index: 0,
            key: "a".into(),
        };
        let jump = ProgressEvent::Jump {
            job: "main".into(),
            from: 3,
            label: "a".into(),
            to: 0,
        };
        assert_eq!(error.verbosity(), Verbosity::Quiet);
        assert_eq!(skipped.verbosity(), Verbosity::Normal);
        assert_eq!(jump.verbosity(), Verbosity::Verbose);
    }

    #[test]
    fn test_event_json_tagged() {
        let event = ProgressEvent::Wait {
            job: "main".into(),
            seconds: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Wait");
        assert_eq!(json["seconds"], 2);
    }

    #[test]
    fn test_console_format_duration() {
        assert_eq!(ConsoleHandler::format_duration(500), "500ms");
        assert_eq!(ConsoleHandler::format_duration(1000), "1.0s");
        assert_eq!(ConsoleHandler::format_duration(2500), "2.5s");
    }

    #[test]
    fn test_create_handler() {
        let _ = create_handler(OutputMode::Console);
        let _ = create_handler(OutputMode::Json);
        let _ = create_handler(OutputMode::Quiet);
    }
}
