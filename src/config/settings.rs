//! Settings loading with multi-layer merge

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How much progress the engine reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Failures and `print` output only
    Quiet,
    /// Job start/finish, skipped and recovered actions
    #[default]
    Normal,
    /// Every action, loop and jump
    Verbose,
}

/// Top-level actionflow settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub defaults: Defaults,
}

/// Global default settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Progress verbosity
    #[serde(default)]
    pub verbosity: Verbosity,

    /// Output mode: console, json or quiet
    #[serde(default = "default_output")]
    pub output: String,

    /// Abort a run after this many executed actions
    pub max_steps: Option<u64>,

    /// Deepest allowed chain of sub-workflow calls
    #[serde(default = "default_max_depth")]
    pub max_sub_workflow_depth: usize,

    /// Append logs to this file
    pub log_file: Option<PathBuf>,
}

fn default_output() -> String {
    "console".to_string()
}

fn default_max_depth() -> usize {
    16
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::default(),
            output: default_output(),
            max_steps: None,
            max_sub_workflow_depth: default_max_depth(),
            log_file: None,
        }
    }
}

/// Settings the engine itself consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub verbosity: Verbosity,
    pub max_steps: Option<u64>,
    pub max_sub_workflow_depth: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::default(),
            max_steps: None,
            max_sub_workflow_depth: default_max_depth(),
        }
    }
}

impl Settings {
    /// Load settings from the standard hierarchy
    ///
    /// Load order (later overrides earlier):
    /// 1. Built-in defaults
    /// 2. ~/.config/actionflow/config.toml
    /// 3. .actionflow/config.toml (project)
    pub fn load(project_dir: Option<&Path>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                let user = Self::load_file(&user_path)
                    .with_context(|| format!("loading {}", user_path.display()))?;
                settings.merge(user);
            }
        }

        let project_path = project_dir
            .map(|p| p.join(".actionflow/config.toml"))
            .unwrap_or_else(|| PathBuf::from(".actionflow/config.toml"));

        if project_path.exists() {
            let project = Self::load_file(&project_path)
                .with_context(|| format!("loading {}", project_path.display()))?;
            settings.merge(project);
        }

        Ok(settings)
    }

    /// Load settings from a specific file
    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// ~/.config/actionflow/config.toml
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("actionflow/config.toml"))
    }

    /// Merge another layer into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        let theirs = other.defaults;
        let ours = &mut self.defaults;

        if theirs.verbosity != Verbosity::default() {
            ours.verbosity = theirs.verbosity;
        }
        if theirs.output != default_output() {
            ours.output = theirs.output;
        }
        if theirs.max_steps.is_some() {
            ours.max_steps = theirs.max_steps;
        }
        if theirs.max_sub_workflow_depth != default_max_depth() {
            ours.max_sub_workflow_depth = theirs.max_sub_workflow_depth;
        }
        if theirs.log_file.is_some() {
            ours.log_file = theirs.log_file;
        }
    }

    /// Engine-facing subset
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            verbosity: self.defaults.verbosity,
            max_steps: self.defaults.max_steps,
            max_sub_workflow_depth: self.defaults.max_sub_workflow_depth,
        }
    }
}
