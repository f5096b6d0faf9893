//! Manifest, job and action definitions

use crate::template::{TemplateEngine, has_template_syntax};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Declared parameter of a sub-workflow job
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InputDef {
    /// Whether a caller must supply this input
    #[serde(default)]
    pub required: bool,

    /// Value bound when the caller omits it
    pub default: Option<JsonValue>,

    /// Description for help text
    #[serde(default)]
    pub description: String,
}

/// One instruction of a job
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Action {
    /// Label, used as a `goto` target
    #[serde(default)]
    pub key: String,

    /// Operator and `;`-separated arguments, e.g. `for;i;0;10`
    pub action: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Flag token; true skips the action entirely
    #[serde(default, deserialize_with = "flag_token")]
    pub disabled: String,

    /// What to do when the handler fails: empty or `end` propagates, `goto;<label>` jumps
    #[serde(default)]
    pub fail: String,

    /// Flag token; true swallows handler errors
    #[serde(default, deserialize_with = "flag_token")]
    pub continue_on_error: String,

    /// Handler parameters
    #[serde(default)]
    pub config: BTreeMap<String, JsonValue>,
}

impl Action {
    pub fn new(key: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn disabled(mut self, token: impl Into<String>) -> Self {
        self.disabled = token.into();
        self
    }

    pub fn on_fail(mut self, directive: impl Into<String>) -> Self {
        self.fail = directive.into();
        self
    }

    pub fn continue_on_error(mut self, token: impl Into<String>) -> Self {
        self.continue_on_error = token.into();
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Operator name as written, before token resolution
    pub fn raw_operator(&self) -> String {
        self.action
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    }
}

/// A named, ordered list of actions
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Job {
    /// Unique job key
    pub key: String,

    /// Human-readable title
    #[serde(default)]
    pub title: String,

    /// Only callable through a sub-workflow invocation
    #[serde(default)]
    pub is_sub_workflow: bool,

    /// Declared inputs for sub-workflow calls
    #[serde(default)]
    pub inputs: BTreeMap<String, InputDef>,

    /// Instructions; the index is the address
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Job {
    pub fn new(key: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            key: key.into(),
            actions,
            ..Default::default()
        }
    }

    pub fn sub_workflow(mut self) -> Self {
        self.is_sub_workflow = true;
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, input: InputDef) -> Self {
        self.inputs.insert(name.into(), input);
        self
    }

    /// Address of the first action labelled `label`
    pub fn key_index(&self, label: &str) -> Option<usize> {
        self.actions.iter().position(|a| a.key == label)
    }

    /// Address of the `next` closing the `for` at `for_index`
    ///
    /// Scans the raw action strings, so loops whose `for`/`next` operator is
    /// itself produced by a template are not seen.
    pub fn matching_next(&self, for_index: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (index, action) in self.actions.iter().enumerate().skip(for_index + 1) {
            match action.raw_operator().as_str() {
                "for" => depth += 1,
                "next" if depth == 0 => return Some(index),
                "next" => depth -= 1,
                _ => {}
            }
        }
        None
    }
}

/// The full set of jobs an engine can run
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Manifest name
    #[serde(default)]
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Values seeded into every run's model
    #[serde(default)]
    pub vars: BTreeMap<String, JsonValue>,

    /// Jobs by position; keys must be unique
    #[serde(default)]
    pub jobs: Vec<Arc<Job>>,
}

impl Manifest {
    pub fn new(jobs: Vec<Job>) -> Self {
        Self {
            jobs: jobs.into_iter().map(Arc::new).collect(),
            ..Default::default()
        }
    }

    /// Parse a TOML manifest
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("parsing manifest TOML")
    }

    /// Parse a JSON manifest
    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("parsing manifest JSON")
    }

    /// Load and validate a manifest file; `.json` files are JSON, anything else TOML
    pub fn load(path: &Path) -> Result<Self> {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        let path = Path::new(&expanded);

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let manifest = if is_json {
            Self::from_json(&contents)
        } else {
            Self::from_toml(&contents)
        }
        .with_context(|| format!("loading {}", path.display()))?;

        manifest.validate().map_err(|errors| {
            anyhow::anyhow!(
                "manifest {} failed validation:\n  {}",
                path.display(),
                errors.join("\n  ")
            )
        })?;

        tracing::debug!(path = %path.display(), jobs = manifest.jobs.len(), "Loaded manifest");
        Ok(manifest)
    }

    /// Job with the given key
    pub fn job(&self, key: &str) -> Option<Arc<Job>> {
        self.jobs.iter().find(|j| j.key == key).cloned()
    }

    /// Static checks that do not need a run
    ///
    /// Templated tokens are checked for syntax only; labels and operators
    /// they produce are known at run time.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let templates = TemplateEngine::new();

        let mut seen_jobs = HashSet::new();
        for job in &self.jobs {
            if job.key.trim().is_empty() {
                errors.push("job with empty key".to_string());
            }
            if !seen_jobs.insert(job.key.as_str()) {
                errors.push(format!("duplicate job key: {}", job.key));
            }
            validate_job(job, &templates, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn validate_job(job: &Job, templates: &TemplateEngine, errors: &mut Vec<String>) {
    let mut seen_labels = HashSet::new();
    let mut open_loops = 0usize;

    for (index, action) in job.actions.iter().enumerate() {
        let tokens = [
            &action.action,
            &action.disabled,
            &action.continue_on_error,
            &action.fail,
        ];
        for token in tokens {
            if let Err(err) = templates.validate(token) {
                errors.push(format!("job '{}': action {}: {}", job.key, index, err));
            }
        }

        if !action.key.is_empty() && !seen_labels.insert(action.key.as_str()) {
            errors.push(format!(
                "job '{}': duplicate action label '{}'",
                job.key, action.key
            ));
        }

        if action.action.trim().is_empty() {
            errors.push(format!("job '{}': action {} is empty", job.key, index));
            continue;
        }

        match action.raw_operator().as_str() {
            "for" => open_loops += 1,
            "next" if open_loops == 0 => errors.push(format!(
                "job '{}': 'next' at action {} has no matching 'for'",
                job.key, index
            )),
            "next" => open_loops -= 1,
            "goto" => check_static_label(job, index, &action.action, "goto", errors),
            _ => {}
        }

        if action.fail.trim().to_lowercase().starts_with("goto") {
            check_static_label(job, index, &action.fail, "fail", errors);
        }
    }

    if open_loops > 0 {
        errors.push(format!(
            "job '{}': {} 'for' without a matching 'next'",
            job.key, open_loops
        ));
    }
}

fn check_static_label(job: &Job, index: usize, token: &str, field: &str, errors: &mut Vec<String>) {
    if has_template_syntax(token) {
        return;
    }
    match token.split(';').nth(1).map(str::trim) {
        Some(label) if job.key_index(label).is_some() => {}
        Some(label) => errors.push(format!(
            "job '{}': {} at action {} targets unknown label '{}'",
            job.key, field, index, label
        )),
        None => errors.push(format!(
            "job '{}': {} at action {} has no label",
            job.key, field, index
        )),
    }
}

/// Accept `true`/`false` as well as token strings for flag fields
fn flag_token<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Token(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b.to_string(),
        Flag::Token(s) => s,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
        name = "release"
        description = "Build and ship"

        [vars]
        target = "prod"
        retries = 3

        [[jobs]]
        key = "main"
        title = "Main job"

        [[jobs.actions]]
        key = "start"
        action = "print;starting"

        [[jobs.actions]]
        action = "for;i;1;3"

        [[jobs.actions]]
        key = "build"
        action = "shell"
        continue_on_error = true
        fail = "goto;start"
        [jobs.actions.config]
        command = "make"

        [[jobs.actions]]
        action = "next"

        [[jobs]]
        key = "notify"
        is_sub_workflow = true

        [jobs.inputs.channel]
        required = true

        [[jobs.actions]]
        action = "print;{{ inputs.channel }}"
        disabled = "{{ vars.quiet }}"
    "#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::from_toml(MANIFEST).unwrap();
        assert_eq!(manifest.name, "release");
        assert_eq!(manifest.jobs.len(), 2);
        assert_eq!(manifest.vars["retries"], serde_json::json!(3));

        let main = manifest.job("main").unwrap();
        assert_eq!(main.actions.len(), 4);
        assert_eq!(main.actions[2].continue_on_error, "true");
        assert_eq!(main.actions[2].config["command"], serde_json::json!("make"));
        assert_eq!(main.actions[0].disabled, "");

        let notify = manifest.job("notify").unwrap();
        assert!(notify.is_sub_workflow);
        assert!(notify.inputs["channel"].required);
    }

    #[test]
    fn test_parse_json_manifest() {
        let json = r#"{
            "jobs": [
                { "key": "main", "actions": [ { "action": "end", "disabled": false } ] }
            ]
        }"#;
        let manifest = Manifest::from_json(json).unwrap();
        assert_eq!(manifest.job("main").unwrap().actions[0].disabled, "false");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
            [[jobs]]
            key = "main"
            [[jobs.actions]]
            action = "end"
            disable = true
        "#;
        assert!(Manifest::from_toml(toml).is_err());
    }

    #[test]
    fn test_key_index() {
        let job = Job::new(
            "main",
            vec![Action::new("a", "print;1"), Action::new("b", "print;2")],
        );
        assert_eq!(job.key_index("b"), Some(1));
        assert_eq!(job.key_index("missing"), None);
    }

    #[test]
    fn test_matching_next_nested() {
        let job = Job::new(
            "main",
            vec![
                Action::new("", "for;i;0;1"),
                Action::new("", "FOR;j;0;1"),
                Action::new("", "print;x"),
                Action::new("", "next"),
                Action::new("", "next"),
            ],
        );
        assert_eq!(job.matching_next(0), Some(4));
        assert_eq!(job.matching_next(1), Some(3));
        assert_eq!(job.matching_next(4), None);
    }

    #[test]
    fn test_validate_ok() {
        let manifest = Manifest::from_toml(MANIFEST).unwrap();
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_problems() {
        let manifest = Manifest::new(vec![
            Job::new(
                "main",
                vec![
                    Action::new("dup", "next"),
                    Action::new("dup", "goto;nowhere"),
                    Action::new("", " "),
                    Action::new("x", "shell").on_fail("goto;missing"),
                    Action::new("", "for;i;0;1"),
                ],
            ),
            Job::new("main", vec![]),
        ]);

        let errors = manifest.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("duplicate job key")));
        assert!(errors.iter().any(|e| e.contains("duplicate action label 'dup'")));
        assert!(errors.iter().any(|e| e.contains("no matching 'for'")));
        assert!(errors.iter().any(|e| e.contains("unknown label 'nowhere'")));
        assert!(errors.iter().any(|e| e.contains("unknown label 'missing'")));
        assert!(errors.iter().any(|e| e.contains("is empty")));
        assert!(errors.iter().any(|e| e.contains("without a matching 'next'")));
    }

    #[test]
    fn test_validate_reports_template_syntax() {
        let manifest = Manifest::new(vec![Job::new(
            "main",
            vec![
                Action::new("", "print;{{ vars.name "),
                Action::new("", "print;ok").disabled("{% if %}"),
            ],
        )]);

        let errors = manifest.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("job 'main': action 0: syntax error"));
        assert!(errors[1].starts_with("job 'main': action 1: syntax error"));
    }

    #[test]
    fn test_validate_skips_templated_labels() {
        let manifest = Manifest::new(vec![Job::new(
            "main",
            vec![Action::new("", "goto;{{ vars.where }}")],
        )]);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flow.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", MANIFEST).unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert!(manifest.job("main").is_some());
    }

    #[test]
    fn test_load_invalid_file_fails_validation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(
            &path,
            "[[jobs]]\nkey = \"main\"\n[[jobs.actions]]\naction = \"goto;nowhere\"\n",
        )
        .unwrap();

        let err = Manifest::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("nowhere"));
    }
}
