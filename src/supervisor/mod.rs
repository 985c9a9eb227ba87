// src/supervisor/mod.rs

//! The supervisor: owns every [`ProcessHandle`] and drives startup and
//! shutdown.
//!
//! - [`Supervisor::start`] launches all units concurrently and returns once
//!   each is running or has failed to spawn. Output keeps streaming in
//!   background tasks afterwards.
//! - [`Supervisor::terminate_all`] runs the termination protocol on every
//!   handle concurrently. It never fails; per-handle problems end up in the
//!   [`TerminationReport`].

pub mod launch;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::errors::{ConciergeError, Result};
use crate::exec::ProcessHandle;
use crate::output::{OutputSink, SupervisorEvent};
use crate::types::{RenderMode, TerminationOutcome};
use crate::unit::WorkUnit;

pub use launch::launch_one;

/// Knobs for launching and terminating units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorOptions {
    /// Wait after SIGTERM before escalating to SIGKILL.
    pub grace_period: Duration,
    /// Bound on the wait after SIGKILL; `None` waits indefinitely.
    pub kill_timeout: Option<Duration>,
    pub stdout_mode: RenderMode,
    pub stderr_mode: RenderMode,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for SupervisorOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            grace_period: settings.grace_period,
            kill_timeout: settings.kill_timeout,
            stdout_mode: settings.stdout_mode,
            stderr_mode: settings.stderr_mode,
        }
    }
}

/// Outcome of launching one unit: the running handle or why it failed.
#[derive(Debug)]
pub struct UnitLaunch {
    pub name: String,
    pub result: Result<Arc<ProcessHandle>>,
}

/// One entry per unit passed to [`Supervisor::start`], in input order.
#[derive(Debug, Default)]
pub struct StartReport {
    pub units: Vec<UnitLaunch>,
}

impl StartReport {
    pub fn running(&self) -> impl Iterator<Item = &Arc<ProcessHandle>> {
        self.units.iter().filter_map(|u| u.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ConciergeError)> {
        self.units
            .iter()
            .filter_map(|u| u.result.as_ref().err().map(|e| (u.name.as_str(), e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationEntry {
    pub name: String,
    pub pid: u32,
    pub outcome: TerminationOutcome,
}

/// One entry per handle, in launch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminationReport {
    pub entries: Vec<TerminationEntry>,
}

impl TerminationReport {
    pub fn outcome_of(&self, name: &str) -> Option<&TerminationOutcome> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TerminationEntry> {
        self.entries.iter().filter(|e| e.outcome.is_failure())
    }
}

pub struct Supervisor {
    sink: Arc<dyn OutputSink>,
    options: SupervisorOptions,
    handles: Vec<Arc<ProcessHandle>>,
}

impl Supervisor {
    pub fn new(sink: Arc<dyn OutputSink>, options: SupervisorOptions) -> Self {
        Self {
            sink,
            options,
            handles: Vec::new(),
        }
    }

    pub fn options(&self) -> &SupervisorOptions {
        &self.options
    }

    /// Every handle that reached `Running`, in launch order.
    pub fn handles(&self) -> &[Arc<ProcessHandle>] {
        &self.handles
    }

    pub fn handle(&self, name: &str) -> Option<&Arc<ProcessHandle>> {
        self.handles.iter().find(|h| h.name() == name)
    }

    /// Launch every unit concurrently.
    ///
    /// A unit that fails to spawn is reported and skipped; it never stops
    /// the other units from starting.
    pub async fn start(&mut self, units: Vec<WorkUnit>) -> StartReport {
        info!(count = units.len(), "launching work units");

        let launches: Vec<_> = units
            .into_iter()
            .map(|unit| {
                let name = unit.name().to_string();
                let task = tokio::spawn(launch_one(
                    Arc::new(unit),
                    self.options.clone(),
                    Arc::clone(&self.sink),
                ));
                (name, task)
            })
            .collect();

        let mut report = StartReport::default();
        for (name, task) in launches {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(ConciergeError::Other(anyhow!(
                    "launch task for '{name}' did not complete: {e}"
                ))),
            };

            match &result {
                Ok(handle) => self.handles.push(Arc::clone(handle)),
                Err(e) => {
                    error!(unit = %name, error = %e, "failed to launch work unit");
                    self.sink.event(&SupervisorEvent::SpawnFailed {
                        unit: name.clone(),
                        error: e.to_string(),
                    });
                }
            }
            report.units.push(UnitLaunch { name, result });
        }

        report
    }

    /// Resolve once every leader process has exited on its own or been
    /// terminated.
    pub async fn wait_all(&self) {
        for handle in &self.handles {
            if let Err(e) = handle.wait().await {
                warn!(unit = %handle.name(), pid = handle.pid(), error = %e, "could not wait for process");
            }
        }
    }

    /// Join the output-draining tasks so buffered lines reach the sink.
    ///
    /// A stream can outlive its leader when a descendant in another process
    /// group keeps the pipe open, so the whole flush is bounded by `limit`.
    pub async fn flush_output(&self, limit: Duration) {
        let deadline = Instant::now() + limit;
        for handle in &self.handles {
            for task in handle.take_output_tasks() {
                if timeout_at(deadline, task).await.is_err() {
                    debug!(unit = %handle.name(), "output stream still open after flush deadline");
                }
            }
        }
    }

    /// Run the termination protocol on every handle concurrently.
    ///
    /// Handles that are already terminal are not signalled. Calling this
    /// again after a completed sweep signals nothing and reports
    /// [`TerminationOutcome::AlreadyExited`] for every handle.
    pub async fn terminate_all(&self) -> TerminationReport {
        let live = self
            .handles
            .iter()
            .filter(|h| !h.state().is_terminal())
            .count();
        info!(live, total = self.handles.len(), "terminating processes");
        self.sink
            .event(&SupervisorEvent::TerminationStarted { count: live });

        let grace = self.options.grace_period;
        let kill_timeout = self.options.kill_timeout;
        let tasks: Vec<_> = self
            .handles
            .iter()
            .map(|handle| {
                let handle = Arc::clone(handle);
                tokio::spawn(async move { handle.terminate(grace, kill_timeout).await })
            })
            .collect();

        let mut report = TerminationReport::default();
        for (handle, task) in self.handles.iter().zip(tasks) {
            let outcome = task.await.unwrap_or_else(|e| {
                TerminationOutcome::Failed(format!("termination task did not complete: {e}"))
            });

            self.sink.event(&SupervisorEvent::Terminated {
                unit: handle.name().to_string(),
                pid: handle.pid(),
                outcome: outcome.clone(),
            });
            report.entries.push(TerminationEntry {
                name: handle.name().to_string(),
                pid: handle.pid(),
                outcome,
            });
        }

        report
    }

    /// [`terminate_all`](Self::terminate_all), unless `abandon` resolves
    /// first.
    ///
    /// Returns `None` when abandoned. Per-handle termination tasks keep
    /// running in the background; only the wait for the report is dropped.
    pub async fn terminate_all_unless<F>(&self, abandon: F) -> Option<TerminationReport>
    where
        F: Future,
    {
        tokio::select! {
            report = self.terminate_all() => Some(report),
            _ = abandon => {
                warn!("termination sweep abandoned before it finished");
                None
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn adopt_handle(&mut self, handle: Arc<ProcessHandle>) {
        self.handles.push(handle);
    }
}
