//! Manifest definitions and settings loading for actionflow

mod manifest;
mod settings;

pub use manifest::{Action, InputDef, Job, Manifest};
pub use settings::{Defaults, EngineSettings, Settings, Verbosity};
