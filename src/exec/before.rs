// src/exec/before.rs

//! The optional setup command that runs before a unit's main command.

use std::process::ExitStatus;

use tracing::{debug, info, warn};

use crate::errors::{ConciergeError, Result};
use crate::exec::command::group_shell_command;
use crate::unit::WorkUnit;

/// Run `before` for `unit` to completion and return its exit status.
///
/// The before-step runs in the unit's working directory with the parent
/// environment as-is: the unit's environment overrides are *not* applied.
/// Its output is collected while it runs and logged at debug level.
///
/// A non-zero exit status is returned, not turned into an error; callers
/// start the main command either way. Only a failure to launch or wait on
/// the before-step is an error.
pub async fn run_before_step(unit: &WorkUnit, before: &str) -> Result<ExitStatus> {
    info!(unit = %unit.name(), cmd = %before, "running before-step");

    let child = group_shell_command(before, unit.working_directory())
        .spawn()
        .map_err(|e| ConciergeError::spawn(unit.name(), e))?;

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| ConciergeError::spawn(unit.name(), e))?;

    for line in String::from_utf8_lossy(&output.stdout).lines() {
        debug!(unit = %unit.name(), "before stdout: {}", line);
    }
    for line in String::from_utf8_lossy(&output.stderr).lines() {
        debug!(unit = %unit.name(), "before stderr: {}", line);
    }

    if output.status.success() {
        info!(unit = %unit.name(), "before-step finished");
    } else {
        warn!(
            unit = %unit.name(),
            status = %output.status,
            "before-step failed; the command will be started anyway"
        );
    }

    Ok(output.status)
}
