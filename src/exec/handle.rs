// src/exec/handle.rs

//! One supervised OS process group and its termination protocol.

use std::process::ExitStatus;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{getpgid, getpgrp, Pid};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::errors::{ConciergeError, Result};
use crate::output::{OutputSink, SupervisorEvent};
use crate::types::{ProcessState, TerminationOutcome};
use crate::unit::WorkUnit;

/// A running (or finished) unit process.
///
/// - The leader's exit status is published by a background waiter task that
///   owns the `Child`; everything else observes it through a `watch`
///   channel.
/// - `state` is behind a per-handle mutex so that the waiter and the
///   termination protocol never interleave a transition. The lock is never
///   held across an `.await`.
#[derive(Debug)]
pub struct ProcessHandle {
    unit: Arc<WorkUnit>,
    pid: u32,
    state: Mutex<ProcessState>,
    exit_rx: watch::Receiver<Option<ExitStatus>>,
    output_tasks: Mutex<Vec<JoinHandle<()>>>,
    before_status: Option<ExitStatus>,
}

/// The pipes taken from a freshly adopted child.
pub struct ChildPipes {
    pub stdout: Option<ChildStdout>,
    pub stderr: Option<ChildStderr>,
}

enum Begin {
    Started,
    AlreadyTerminal,
    InProgress,
}

impl ProcessHandle {
    /// Take ownership of a freshly spawned child.
    ///
    /// The returned handle is `Running`, the `UnitStarted` event has been
    /// emitted and the exit waiter is already running. The child's
    /// stdout/stderr are handed back so the caller can attach output
    /// consumers after the handle exists.
    pub fn adopt(
        unit: Arc<WorkUnit>,
        mut child: Child,
        before_status: Option<ExitStatus>,
        sink: Arc<dyn OutputSink>,
    ) -> Result<(Arc<Self>, ChildPipes)> {
        let pid = child.id().ok_or_else(|| {
            ConciergeError::spawn(
                unit.name(),
                std::io::Error::other("spawned child did not have a pid"),
            )
        })?;

        let pipes = ChildPipes {
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
        };

        let (exit_tx, exit_rx) = watch::channel(None);
        let handle = Arc::new(Self {
            unit,
            pid,
            state: Mutex::new(ProcessState::Running),
            exit_rx,
            output_tasks: Mutex::new(Vec::new()),
            before_status,
        });

        info!(unit = %handle.name(), pid, "process started");
        sink.event(&SupervisorEvent::UnitStarted {
            unit: handle.name().to_string(),
            pid,
        });

        let waiter = Arc::clone(&handle);
        tokio::spawn(async move {
            waiter.watch_exit(child, exit_tx, sink).await;
        });

        Ok((handle, pipes))
    }

    async fn watch_exit(
        &self,
        mut child: Child,
        exit_tx: watch::Sender<Option<ExitStatus>>,
        sink: Arc<dyn OutputSink>,
    ) {
        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                // Dropping `exit_tx` makes every waiter see a closed channel.
                error!(unit = %self.name(), pid = self.pid, error = %e, "failed to wait for process");
                return;
            }
        };

        let natural = {
            let mut state = self.lock_state();
            if *state == ProcessState::Running {
                *state = ProcessState::Exited;
                true
            } else {
                false
            }
        };
        exit_tx.send_replace(Some(status));

        if natural {
            info!(unit = %self.name(), pid = self.pid, %status, "process exited");
            sink.event(&SupervisorEvent::UnitExited {
                unit: self.name().to_string(),
                pid: self.pid,
                status,
            });
        }
    }

    pub fn unit(&self) -> &WorkUnit {
        &self.unit
    }

    pub fn name(&self) -> &str {
        self.unit.name()
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        *self.lock_state()
    }

    /// Exit status of the before-step, if the unit has one.
    pub fn before_status(&self) -> Option<ExitStatus> {
        self.before_status
    }

    /// Exit status of the leader process, if it has exited.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        *self.exit_rx.borrow()
    }

    /// Wait until the leader process exits.
    pub async fn wait(&self) -> Result<ExitStatus> {
        let mut rx = self.exit_rx.clone();
        wait_for_exit(&mut rx, self.pid).await
    }

    pub(crate) fn attach_output(&self, tasks: Vec<JoinHandle<()>>) {
        self.lock_output().extend(tasks);
    }

    /// Number of output-draining tasks attached and not yet collected.
    pub fn output_task_count(&self) -> usize {
        self.lock_output().len()
    }

    pub(crate) fn take_output_tasks(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.lock_output())
    }

    /// Drive this handle through the termination protocol.
    ///
    /// SIGTERM to the whole process group, up to `grace` for the leader to
    /// exit, then SIGKILL. After SIGKILL the wait is unbounded unless
    /// `kill_timeout` is given. Failures are logged and returned as
    /// [`TerminationOutcome::Failed`]; this never panics or errors. A failed
    /// attempt leaves the handle `Running`, so calling this again retries.
    pub async fn terminate(
        &self,
        grace: Duration,
        kill_timeout: Option<Duration>,
    ) -> TerminationOutcome {
        match self.begin_termination() {
            Begin::Started => {}
            Begin::AlreadyTerminal => {
                debug!(unit = %self.name(), pid = self.pid, "already terminal; nothing to signal");
                return TerminationOutcome::AlreadyExited;
            }
            Begin::InProgress => {
                return TerminationOutcome::Failed("termination already in progress".to_string());
            }
        }

        if self.exit_status().is_some() {
            self.finish(ProcessState::Exited);
            return TerminationOutcome::AlreadyExited;
        }

        let pgid = match getpgid(Some(Pid::from_raw(self.pid as i32))) {
            Ok(pgid) => pgid,
            Err(e) => {
                debug!(unit = %self.name(), pid = self.pid, error = %e, "process group is gone");
                self.finish(ProcessState::Exited);
                return TerminationOutcome::AlreadyExited;
            }
        };

        match self.escalate(pgid, grace, kill_timeout).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(unit = %self.name(), pid = self.pid, error = %e, "error terminating process");
                self.abandon_termination();
                TerminationOutcome::Failed(e.to_string())
            }
        }
    }

    async fn escalate(
        &self,
        pgid: Pid,
        grace: Duration,
        kill_timeout: Option<Duration>,
    ) -> Result<TerminationOutcome> {
        if pgid == getpgrp() {
            return Err(ConciergeError::termination(
                self.pid,
                format!("process group {pgid} is the supervisor's own group; refusing to signal it"),
            ));
        }

        signal_group(self.pid, pgid, Signal::SIGTERM)?;

        let mut rx = self.exit_rx.clone();
        if let Ok(status) = timeout(grace, wait_for_exit(&mut rx, self.pid)).await {
            let status = status?;
            self.finish(ProcessState::Exited);
            info!(unit = %self.name(), pid = self.pid, %status, "process terminated gracefully");
            return Ok(TerminationOutcome::Graceful);
        }

        warn!(
            unit = %self.name(),
            pid = self.pid,
            pgid = %pgid,
            grace = ?grace,
            "process did not exit after SIGTERM; sending SIGKILL"
        );
        signal_group(self.pid, pgid, Signal::SIGKILL)?;

        let status = match kill_timeout {
            Some(limit) => timeout(limit, wait_for_exit(&mut rx, self.pid))
                .await
                .map_err(|_| {
                    ConciergeError::termination(
                        self.pid,
                        format!("still running {limit:?} after SIGKILL"),
                    )
                })??,
            None => wait_for_exit(&mut rx, self.pid).await?,
        };

        self.finish(ProcessState::Killed);
        info!(unit = %self.name(), pid = self.pid, %status, "process killed");
        Ok(TerminationOutcome::Forced)
    }

    fn begin_termination(&self) -> Begin {
        let mut state = self.lock_state();
        match *state {
            ProcessState::Exited | ProcessState::Killed | ProcessState::NotStarted => {
                Begin::AlreadyTerminal
            }
            ProcessState::Terminating => Begin::InProgress,
            ProcessState::Running => {
                *state = ProcessState::Terminating;
                Begin::Started
            }
        }
    }

    /// Hand a failed attempt back as `Running` so the next sweep retries
    /// it. A leader that exited meanwhile is recorded as `Exited`.
    fn abandon_termination(&self) {
        let exited = self.exit_status().is_some();
        let mut state = self.lock_state();
        if *state == ProcessState::Terminating {
            *state = if exited {
                ProcessState::Exited
            } else {
                ProcessState::Running
            };
        }
    }

    fn finish(&self, terminal: ProcessState) {
        let mut state = self.lock_state();
        if !state.is_terminal() {
            *state = terminal;
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ProcessState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_output(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.output_tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// A `Running` handle for an arbitrary pid, with no waiter behind it.
    #[cfg(test)]
    pub(crate) fn detached(unit: WorkUnit, pid: u32) -> Arc<Self> {
        let (_exit_tx, exit_rx) = watch::channel(None);
        Arc::new(Self {
            unit: Arc::new(unit),
            pid,
            state: Mutex::new(ProcessState::Running),
            exit_rx,
            output_tasks: Mutex::new(Vec::new()),
            before_status: None,
        })
    }
}

async fn wait_for_exit(
    rx: &mut watch::Receiver<Option<ExitStatus>>,
    pid: u32,
) -> Result<ExitStatus> {
    let status = rx
        .wait_for(Option::is_some)
        .await
        .map_err(|_| ConciergeError::termination(pid, "exit status is unavailable"))?;
    (*status).ok_or_else(|| ConciergeError::termination(pid, "exit status is unavailable"))
}

/// Send `signal` to the process group `pgid`.
///
/// A group that no longer exists (`ESRCH`) already got what we wanted.
fn signal_group(pid: u32, pgid: Pid, signal: Signal) -> Result<()> {
    debug!(pid, pgid = %pgid, %signal, "signalling process group");
    match killpg(pgid, signal) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => {
            debug!(pid, pgid = %pgid, "process group already exited");
            Ok(())
        }
        Err(e) => Err(ConciergeError::termination(
            pid,
            format!("failed to send {signal} to process group {pgid}: {e}"),
        )),
    }
}
