// src/exec/mod.rs

//! Process execution layer.
//!
//! Everything that touches OS processes lives here, on top of
//! `tokio::process` and `nix`:
//!
//! - [`command`] builds `sh -c` commands that lead their own process group.
//! - [`env`] computes the effective environment for a unit.
//! - [`before`] runs a unit's before-step to completion.
//! - [`stream`] drains stdout/stderr into an `OutputSink`.
//! - [`handle`] wraps a spawned group in a [`ProcessHandle`] and implements
//!   the SIGTERM → grace period → SIGKILL termination protocol.

pub mod before;
pub mod command;
pub mod env;
pub mod handle;
pub mod stream;

pub use before::run_before_step;
pub use command::group_shell_command;
pub use env::{effective_environment, expand_value};
pub use handle::{ChildPipes, ProcessHandle};
pub use stream::spawn_drain;
