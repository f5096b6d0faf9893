//! CLI module for actionflow
//!
//! This module provides:
//! - Command implementations (run, validate, jobs, actions)
//! - Output handlers (console, JSON, quiet)
//!
//! # Example
//!
//! ```ignore
//! use actionflow::cli::{commands, output};
//!
//! let handler = output::create_handler(output::OutputMode::Console);
//! let exit_code = commands::run_job(path, "main", &vars, &settings, handler)?;
//! ```

pub mod commands;
pub mod output;

pub use commands::{list_actions, list_jobs, parse_vars, run_job, validate_manifest};
pub use output::{
    ConsoleHandler, JsonHandler, OutputHandler, OutputMode, ProgressEvent, QuietHandler,
    RecordingHandler, create_handler,
};
