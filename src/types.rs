use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Lifecycle of a supervised process.
///
/// `Exited` and `Killed` are terminal: a handle never leaves them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProcessState {
    #[default]
    NotStarted,
    Running,
    Terminating,
    Exited,
    Killed,
}

impl ProcessState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Exited | ProcessState::Killed)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::NotStarted => "not started",
            ProcessState::Running => "running",
            ProcessState::Terminating => "terminating",
            ProcessState::Exited => "exited",
            ProcessState::Killed => "killed",
        };
        f.write_str(s)
    }
}

/// How the lines of one output stream are presented.
///
/// - `Plain`: every line is echoed, prefixed with the unit name.
/// - `Progress`: the latest line is shown on a per-unit spinner that is
///   cleared once the stream closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Plain,
    Progress,
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plain" => Ok(RenderMode::Plain),
            "progress" => Ok(RenderMode::Progress),
            other => Err(format!(
                "invalid render mode: {other} (expected \"plain\" or \"progress\")"
            )),
        }
    }
}

/// Result of driving one handle through the termination protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// The process had already exited; nothing was signalled.
    AlreadyExited,
    /// The process exited within the grace period after SIGTERM.
    Graceful,
    /// The grace period ran out and the group was sent SIGKILL.
    Forced,
    /// Signalling or waiting failed. The message is also logged.
    Failed(String),
}

impl TerminationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TerminationOutcome::Failed(_))
    }
}
