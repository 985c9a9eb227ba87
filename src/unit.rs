// src/unit.rs

//! The validated description of one process to supervise.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment overrides for a unit: variable name to a value that may
/// reference parent variables (`$HOME`, `${HOME}`).
pub type EnvOverrides = BTreeMap<String, String>;

/// One named shell command plus how to launch it.
///
/// Immutable once built; the supervisor shares it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    name: String,
    working_directory: PathBuf,
    command: String,
    before_command: Option<String>,
    environment: Option<EnvOverrides>,
}

impl WorkUnit {
    /// A unit running `command` in the current directory, with no
    /// before-step and no environment overrides.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            working_directory: PathBuf::from("."),
            command: command.into(),
            before_command: None,
            environment: None,
        }
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = dir.into();
        self
    }

    pub fn with_before_command(mut self, before: impl Into<String>) -> Self {
        self.before_command = Some(before.into());
        self
    }

    pub fn with_environment(mut self, env: EnvOverrides) -> Self {
        self.environment = Some(env);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn before_command(&self) -> Option<&str> {
        self.before_command.as_deref()
    }

    pub fn environment(&self) -> Option<&EnvOverrides> {
        self.environment.as_ref()
    }
}
