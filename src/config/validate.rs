// src/config/validate.rs

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::config::model::{ConfigFile, ConfigSection, RawConfigFile, Settings, UnitConfig};
use crate::errors::{ConciergeError, Result};
use crate::unit::WorkUnit;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ConciergeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_units(&raw)?;
        let settings = validate_settings(&raw.config)?;

        let mut units = Vec::with_capacity(raw.work.len());
        for (name, unit) in raw.work {
            let unit = build_unit(name, unit)?;
            info!(unit = %unit.name(), cmd = %unit.command(), "loaded work unit");
            units.push(unit);
        }

        Ok(ConfigFile::new_unchecked(settings, units))
    }
}

fn ensure_has_units(cfg: &RawConfigFile) -> Result<()> {
    if cfg.work.is_empty() {
        return Err(ConciergeError::ConfigError(
            "config must contain at least one entry under `work`".to_string(),
        ));
    }
    Ok(())
}

fn validate_settings(section: &ConfigSection) -> Result<Settings> {
    let grace_period = parse_duration(&section.grace_period)
        .map_err(|e| ConciergeError::ConfigError(format!("config.grace_period: {e}")))?;
    if grace_period.is_zero() {
        return Err(ConciergeError::ConfigError(
            "config.grace_period must be greater than zero".to_string(),
        ));
    }

    let kill_timeout = section
        .kill_timeout
        .as_deref()
        .map(parse_duration)
        .transpose()
        .map_err(|e| ConciergeError::ConfigError(format!("config.kill_timeout: {e}")))?;

    Ok(Settings {
        grace_period,
        kill_timeout,
        stdout_mode: section.stdout_mode,
        stderr_mode: section.stderr_mode,
    })
}

fn build_unit(name: String, raw: UnitConfig) -> Result<WorkUnit> {
    let cmd = match raw.cmd {
        Some(cmd) if !cmd.trim().is_empty() => cmd,
        Some(_) => {
            return Err(ConciergeError::ConfigError(format!(
                "work unit '{}' has an empty `cmd`",
                name
            )));
        }
        None => {
            return Err(ConciergeError::ConfigError(format!(
                "work unit '{}' is missing `cmd`",
                name
            )));
        }
    };

    let mut unit = WorkUnit::new(name, cmd).with_working_directory(PathBuf::from(raw.cwd));
    if let Some(before) = raw.before.filter(|b| !b.trim().is_empty()) {
        unit = unit.with_before_command(before);
    }
    if let Some(env) = raw.env.and_then(|blocks| blocks.selected()) {
        unit = unit.with_environment(env);
    }
    Ok(unit)
}

/// Parse a simple duration string like `"5s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
