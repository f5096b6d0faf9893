//! Tracing setup for the CLI
//!
//! Human-readable events go to stderr. A log file, when requested, receives
//! JSON lines carrying the enclosing `job` span, so nested sub-workflow runs
//! can be told apart by their `depth` field.

use std::fs::File;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directive for the given flags; `--debug` wins over `--quiet`
pub fn filter_directive(debug: bool, quiet: bool) -> &'static str {
    if debug {
        "actionflow=debug"
    } else if quiet {
        "actionflow=error"
    } else {
        "actionflow=info"
    }
}

/// Install the global subscriber
///
/// `log_file` is `~`-expanded and appended to; its parent directory is created.
pub fn init_logging(debug: bool, quiet: bool, log_file: Option<PathBuf>) -> anyhow::Result<()> {
    let console = fmt::layer()
        .with_target(false)
        .with_line_number(debug)
        .with_file(debug)
        .with_writer(std::io::stderr);

    let file = log_file
        .map(|path| open_log_file(&path))
        .transpose()?
        .map(|file| {
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_current_span(true)
                .with_span_list(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(file)
        });

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter_directive(debug, quiet)))
        .with(console)
        .with(file)
        .try_init()?;
    Ok(())
}

fn open_log_file(path: &Path) -> anyhow::Result<File> {
    let path = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?)
}

/// Per-run log path: `<config_dir>/actionflow/logs/<job>-<timestamp>.jsonl`
pub fn default_log_path(job: &str) -> anyhow::Result<PathBuf> {
    let log_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("actionflow")
        .join("logs");

    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    Ok(log_dir.join(format!("{}-{}.jsonl", file_stem(job), timestamp)))
}

/// Job keys are free-form; keep them to a single safe path component
fn file_stem(job: &str) -> String {
    let stem: String = job
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() { "job".to_string() } else { stem }
}
