// src/exec/command.rs

//! Building shell commands that run in their own process group.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

/// `sh -c <cmd>` in `cwd`, with stdout/stderr piped and stdin closed.
///
/// The child becomes the leader of a new process group (pgid == pid), so a
/// signal sent to the group reaches every process the shell starts, and an
/// interactive Ctrl-C aimed at the supervisor's group does not reach it.
pub fn group_shell_command(cmd: &str, cwd: &Path) -> Command {
    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(cmd)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);
    command
}
