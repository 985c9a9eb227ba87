#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use concierge::supervisor::SupervisorOptions;
use concierge::unit::{EnvOverrides, WorkUnit};

/// Builder for `WorkUnit` to simplify test setup.
pub struct WorkUnitBuilder {
    unit: WorkUnit,
    env: Option<EnvOverrides>,
}

impl WorkUnitBuilder {
    pub fn new(name: &str, cmd: &str) -> Self {
        Self {
            unit: WorkUnit::new(name, cmd),
            env: None,
        }
    }

    pub fn cwd(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.unit = self.unit.with_working_directory(dir);
        self
    }

    pub fn before(mut self, before: &str) -> Self {
        self.unit = self.unit.with_before_command(before);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> WorkUnit {
        match self.env {
            Some(env) => self.unit.with_environment(env),
            None => self.unit,
        }
    }
}

/// Supervisor options with a short grace period so tests stay fast.
pub fn fast_options(grace: Duration) -> SupervisorOptions {
    SupervisorOptions {
        grace_period: grace,
        ..SupervisorOptions::default()
    }
}
