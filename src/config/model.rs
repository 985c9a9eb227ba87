// src/config/model.rs

use std::fmt;
use std::time::Duration;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::types::RenderMode;
use crate::unit::{EnvOverrides, WorkUnit};

/// Top-level document as read from `concierge.yml`:
///
/// ```yaml
/// config:
///   grace_period: 5s
///
/// work:
///   api:
///     cwd: services/api
///     before: make deps
///     cmd: ./run.sh
///     env:
///       - DATA_DIR: $HOME/data
///   web:
///     cmd: npm start
/// ```
///
/// The same shape is accepted as TOML (`[config]`, `[work.api]`).
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Supervisor behaviour from `config:`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All work units as `(name, entry)` pairs, in the order the file
    /// lists them.
    #[serde(default, deserialize_with = "units_in_file_order")]
    pub work: Vec<(String, UnitConfig)>,
}

/// Read the `work` mapping without losing its key order.
fn units_in_file_order<'de, D>(deserializer: D) -> Result<Vec<(String, UnitConfig)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct UnitsVisitor;

    impl<'de> Visitor<'de> for UnitsVisitor {
        type Value = Vec<(String, UnitConfig)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping of work unit names to unit entries")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut units: Vec<(String, UnitConfig)> =
                Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, unit)) = map.next_entry::<String, UnitConfig>()? {
                if units.iter().any(|(existing, _)| *existing == name) {
                    return Err(serde::de::Error::custom(format!(
                        "duplicate work unit '{name}'"
                    )));
                }
                units.push((name, unit));
            }
            Ok(units)
        }
    }

    deserializer.deserialize_map(UnitsVisitor)
}

/// `config:` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// How long to wait after SIGTERM before sending SIGKILL (`"5s"`,
    /// `"500ms"`, ...).
    #[serde(default = "default_grace_period")]
    pub grace_period: String,

    /// Optional bound on the wait after SIGKILL. Absent means wait for as
    /// long as it takes.
    #[serde(default)]
    pub kill_timeout: Option<String>,

    #[serde(default = "default_stdout_mode")]
    pub stdout_mode: RenderMode,

    #[serde(default = "default_stderr_mode")]
    pub stderr_mode: RenderMode,
}

fn default_grace_period() -> String {
    "5s".to_string()
}

fn default_stdout_mode() -> RenderMode {
    RenderMode::Plain
}

fn default_stderr_mode() -> RenderMode {
    RenderMode::Progress
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            grace_period: default_grace_period(),
            kill_timeout: None,
            stdout_mode: default_stdout_mode(),
            stderr_mode: default_stderr_mode(),
        }
    }
}

/// `work.<name>` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct UnitConfig {
    /// Working directory for both the before-step and the command.
    #[serde(default = "default_cwd")]
    pub cwd: String,

    /// The shell command to supervise. Required; checked during validation
    /// so a missing `cmd` is reported like any other config mistake.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Setup command run to completion before `cmd`.
    #[serde(default)]
    pub before: Option<String>,

    /// Environment overrides, either one mapping or a list of mappings.
    #[serde(default)]
    pub env: Option<EnvBlocks>,
}

fn default_cwd() -> String {
    ".".to_string()
}

/// The `env` field as written in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EnvBlocks {
    Single(EnvOverrides),
    List(Vec<EnvOverrides>),
}

impl EnvBlocks {
    /// The one block that is honoured.
    ///
    /// For a list this is the last entry; blocks are never merged. An empty
    /// list means no overrides.
    pub fn selected(self) -> Option<EnvOverrides> {
        match self {
            EnvBlocks::Single(block) => Some(block),
            EnvBlocks::List(mut blocks) => blocks.pop(),
        }
    }
}

/// Supervisor settings after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub grace_period: Duration,
    pub kill_timeout: Option<Duration>,
    pub stdout_mode: RenderMode,
    pub stderr_mode: RenderMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(5),
            kill_timeout: None,
            stdout_mode: default_stdout_mode(),
            stderr_mode: default_stderr_mode(),
        }
    }
}

/// Validated configuration. Construct it through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub settings: Settings,
    pub units: Vec<WorkUnit>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(settings: Settings, units: Vec<WorkUnit>) -> Self {
        Self { settings, units }
    }
}
