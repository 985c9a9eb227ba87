// src/output/mod.rs

//! Rendering of unit output and supervisor status.
//!
//! The supervisor never prints directly. Everything user-facing goes through
//! an [`OutputSink`] handed to it at construction time:
//! - decoded lines from each unit's stdout/stderr, tagged with a
//!   [`RenderMode`],
//! - end-of-stream notifications,
//! - lifecycle [`SupervisorEvent`]s.
//!
//! [`ConsoleSink`] is the terminal implementation used by the binary.

pub mod console;

use std::collections::BTreeMap;
use std::process::ExitStatus;

use crate::types::{RenderMode, TerminationOutcome};

pub use console::ConsoleSink;

/// Lifecycle notifications emitted by the supervisor.
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    BeforeStepStarted {
        unit: String,
        command: String,
    },
    BeforeStepFinished {
        unit: String,
        status: ExitStatus,
    },
    EnvironmentInjected {
        unit: String,
        variables: BTreeMap<String, String>,
    },
    UnitStarted {
        unit: String,
        pid: u32,
    },
    SpawnFailed {
        unit: String,
        error: String,
    },
    UnitExited {
        unit: String,
        pid: u32,
        status: ExitStatus,
    },
    TerminationStarted {
        count: usize,
    },
    Terminated {
        unit: String,
        pid: u32,
        outcome: TerminationOutcome,
    },
}

/// Consumer of unit output and supervisor status.
///
/// Implementations are called concurrently from many tasks and must not
/// block for long.
pub trait OutputSink: Send + Sync {
    /// One line read from `unit`'s stream, without its line terminator.
    fn line(&self, unit: &str, mode: RenderMode, line: &str);

    /// The stream rendered in `mode` for `unit` reached end-of-file.
    fn closed(&self, unit: &str, mode: RenderMode);

    fn event(&self, event: &SupervisorEvent);
}
