// src/supervisor/launch.rs

//! Launching a single work unit.

use std::sync::Arc;

use tracing::info;

use crate::errors::{ConciergeError, Result};
use crate::exec::{effective_environment, group_shell_command, run_before_step, spawn_drain, ProcessHandle};
use crate::output::{OutputSink, SupervisorEvent};
use crate::supervisor::SupervisorOptions;
use crate::unit::WorkUnit;

/// Launch `unit` and return its running handle.
///
/// 1. Run the before-step to completion, if any. Its exit status is
///    recorded but does not stop the command from starting.
/// 2. Expand and overlay the unit's environment overrides.
/// 3. Spawn the command in a new process group.
/// 4. Create the `Running` handle, then attach one draining task to each of
///    stdout and stderr.
pub async fn launch_one(
    unit: Arc<WorkUnit>,
    options: SupervisorOptions,
    sink: Arc<dyn OutputSink>,
) -> Result<Arc<ProcessHandle>> {
    let before_status = match unit.before_command() {
        Some(before) => {
            sink.event(&SupervisorEvent::BeforeStepStarted {
                unit: unit.name().to_string(),
                command: before.to_string(),
            });
            let status = run_before_step(&unit, before).await?;
            sink.event(&SupervisorEvent::BeforeStepFinished {
                unit: unit.name().to_string(),
                status,
            });
            Some(status)
        }
        None => None,
    };

    let mut command = group_shell_command(unit.command(), unit.working_directory());
    if let Some(overrides) = unit.environment() {
        let (env, expanded) = effective_environment(std::env::vars_os(), overrides);
        info!(
            unit = %unit.name(),
            vars = ?expanded.keys().collect::<Vec<_>>(),
            "injecting environment variables"
        );
        sink.event(&SupervisorEvent::EnvironmentInjected {
            unit: unit.name().to_string(),
            variables: expanded,
        });
        command.env_clear().envs(env);
    }

    info!(
        unit = %unit.name(),
        cmd = %unit.command(),
        cwd = %unit.working_directory().display(),
        "starting process"
    );
    let child = command
        .spawn()
        .map_err(|e| ConciergeError::spawn(unit.name(), e))?;

    let (handle, pipes) =
        ProcessHandle::adopt(Arc::clone(&unit), child, before_status, Arc::clone(&sink))?;

    let mut tasks = Vec::with_capacity(2);
    if let Some(stdout) = pipes.stdout {
        tasks.push(spawn_drain(
            stdout,
            unit.name().to_string(),
            options.stdout_mode,
            Arc::clone(&sink),
        ));
    }
    if let Some(stderr) = pipes.stderr {
        tasks.push(spawn_drain(
            stderr,
            unit.name().to_string(),
            options.stderr_mode,
            Arc::clone(&sink),
        ));
    }
    handle.attach_output(tasks);

    Ok(handle)
}
