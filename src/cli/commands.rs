//! CLI command implementations

use super::output::{OutputHandler, ProgressEvent};
use crate::actions::default_registry;
use crate::config::{Manifest, Settings};
use crate::workflow::{ActionRegistry, BUILTIN_OPERATORS, Engine, EngineError};
use anyhow::{Context, Result, bail};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Run a job from a manifest file; returns the process exit code
pub fn run_job(
    manifest_path: &Path,
    job: &str,
    vars: &[String],
    settings: &Settings,
    handler: Arc<dyn OutputHandler>,
) -> Result<i32> {
    let manifest = Manifest::load(manifest_path)
        .with_context(|| format!("Failed to load manifest '{}'", manifest_path.display()))?;
    let parsed_vars = parse_vars(vars)?;

    let mut engine = Engine::new(manifest, default_registry())
        .with_settings(settings.engine_settings())
        .with_output(Arc::clone(&handler));

    for (name, value) in parsed_vars {
        engine.set_global(name, value);
    }

    match engine.run_job(job) {
        Ok(summary) => {
            tracing::debug!(job = %summary.job, outcome = ?summary.outcome, "Run finished");
            Ok(0)
        }
        Err(err) => {
            // Errors inside the loop were already reported by the engine
            if matches!(err, EngineError::JobNotFound { .. } | EngineError::Hook { .. }) {
                handler.emit(ProgressEvent::JobError {
                    job: job.to_string(),
                    error: err.to_string(),
                });
            }
            Ok(1)
        }
    }
}

/// Parse `--var key=value` pairs; values are JSON when they parse, strings otherwise
pub fn parse_vars(vars: &[String]) -> Result<BTreeMap<String, JsonValue>> {
    let mut parsed = BTreeMap::new();

    for var in vars {
        let Some((key, value)) = var.split_once('=') else {
            bail!("invalid --var '{}': expected key=value", var);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("invalid --var '{}': empty key", var);
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| JsonValue::from(value));
        parsed.insert(key.to_string(), value);
    }

    Ok(parsed)
}

/// Validate a manifest without running it
pub fn validate_manifest(manifest_path: &Path, handler: &dyn OutputHandler) -> i32 {
    match Manifest::load(manifest_path) {
        Ok(manifest) => {
            let actions: usize = manifest.jobs.iter().map(|j| j.actions.len()).sum();
            handler.print(&format!(
                "✓ Manifest '{}' is valid ({} jobs, {} actions)",
                manifest_path.display(),
                manifest.jobs.len(),
                actions
            ));
            0
        }
        Err(e) => {
            handler.print(&format!("✗ {:#}", e));
            1
        }
    }
}

/// List the jobs of a manifest
pub fn list_jobs(manifest_path: &Path, handler: &dyn OutputHandler) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;

    if manifest.jobs.is_empty() {
        handler.print("(no jobs defined)");
        return Ok(());
    }

    for job in &manifest.jobs {
        let kind = if job.is_sub_workflow { " [sub-workflow]" } else { "" };
        handler.print(&format!("{}{} ({} actions)", job.key, kind, job.actions.len()));
        if !job.title.is_empty() {
            handler.print(&format!("  {}", job.title));
        }
        for (name, input) in &job.inputs {
            let required = if input.required { "required" } else { "optional" };
            handler.print(&format!("  input {} ({})", name, required));
        }
    }
    Ok(())
}

/// List built-in operators and registered handlers
pub fn list_actions(registry: &ActionRegistry, handler: &dyn OutputHandler) {
    handler.print(&format!("built-in: {}", BUILTIN_OPERATORS.join(", ")));
    handler.print(&format!("handlers: {}", registry.names().join(", ")));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::output::RecordingHandler;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
        [[jobs]]
        key = "main"
        title = "Say hello"
        actions = [
            { action = "print;hello {{ vars.name }}" },
            { action = "sub-workflow;child" },
        ]

        [[jobs]]
        key = "child"
        is_sub_workflow = true
        actions = [ { action = "print;child" } ]

        [jobs.inputs.region]
        required = false

        [[jobs]]
        key = "broken"
        actions = [ { action = "error;nope" } ]
    "#;

    fn write_manifest(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("flow.toml");
        std::fs::write(&path, MANIFEST).unwrap();
        path
    }

    #[test]
    fn test_parse_vars() {
        let vars = vec![
            "name=ada".to_string(),
            "count=5".to_string(),
            "url=a=b".to_string(),
        ];
        let parsed = parse_vars(&vars).unwrap();

        assert_eq!(parsed["name"], JsonValue::from("ada"));
        assert_eq!(parsed["count"], JsonValue::from(5));
        assert_eq!(parsed["url"], JsonValue::from("a=b"));
    }

    #[test]
    fn test_parse_vars_rejects_malformed() {
        assert!(parse_vars(&["novalue".to_string()]).is_err());
        assert!(parse_vars(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_run_job_exit_codes() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir);
        let settings = Settings::default();

        let handler = Arc::new(RecordingHandler::new());
        let code = run_job(
            &path,
            "main",
            &["name=ada".to_string()],
            &settings,
            handler.clone(),
        )
        .unwrap();
        assert_eq!(code, 0);
        assert_eq!(handler.printed(), vec!["hello ada", "child"]);

        let code = run_job(&path, "broken", &[], &settings, handler.clone()).unwrap();
        assert_eq!(code, 1);

        let code = run_job(&path, "missing", &[], &settings, handler.clone()).unwrap();
        assert_eq!(code, 1);
        assert!(matches!(
            handler.events().last(),
            Some(ProgressEvent::JobError { job, .. }) if job == "missing"
        ));
    }

    #[test]
    fn test_run_job_bad_manifest() {
        let handler = Arc::new(RecordingHandler::new());
        let result = run_job(
            Path::new("/nonexistent/flow.toml"),
            "main",
            &[],
            &Settings::default(),
            handler,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_manifest() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir);
        let handler = RecordingHandler::new();

        assert_eq!(validate_manifest(&path, &handler), 0);
        assert!(handler.printed()[0].contains("3 jobs"));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[[jobs]]\nkey = \"x\"\nactions = [ { action = \"next\" } ]\n").unwrap();
        assert_eq!(validate_manifest(&bad, &handler), 1);
    }

    #[test]
    fn test_list_jobs() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir);
        let handler = RecordingHandler::new();

        list_jobs(&path, &handler).unwrap();
        let printed = handler.printed();
        assert_eq!(printed[0], "main (2 actions)");
        assert_eq!(printed[1], "  Say hello");
        assert_eq!(printed[2], "child [sub-workflow] (1 actions)");
        assert_eq!(printed[3], "  input region (optional)");
    }

    #[test]
    fn test_list_actions() {
        let handler = RecordingHandler::new();
        list_actions(&default_registry(), &handler);

        let printed = handler.printed();
        assert!(printed[0].starts_with("built-in: for, next"));
        assert_eq!(printed[1], "handlers: set, shell, sub-workflow");
    }
}
