// src/output/console.rs

//! Terminal rendering with `crossterm` colours and `indicatif` spinners.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crossterm::style::Stylize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::{OutputSink, SupervisorEvent};
use crate::types::{RenderMode, TerminationOutcome};

/// Writes unit output and status lines to the terminal.
///
/// `Plain` lines are printed as `[unit] line`. `Progress` lines replace the
/// message of a per-unit spinner, which is cleared when the stream closes.
/// All printing goes through [`MultiProgress::suspend`] so active spinners
/// are redrawn below the printed line.
pub struct ConsoleSink {
    multi: MultiProgress,
    spinners: Mutex<HashMap<String, ProgressBar>>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            spinners: Mutex::new(HashMap::new()),
        }
    }

    fn spinners(&self) -> MutexGuard<'_, HashMap<String, ProgressBar>> {
        self.spinners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn print(&self, text: String) {
        self.multi.suspend(|| println!("{text}"));
    }

    fn spinner_for(&self, unit: &str) -> ProgressBar {
        let mut spinners = self.spinners();
        if let Some(bar) = spinners.get(unit) {
            return bar.clone();
        }

        let bar = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) =
            ProgressStyle::default_spinner().template("  {spinner:.green} {prefix:.bold} {wide_msg}")
        {
            bar.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"]),
            );
        }
        bar.set_prefix(format!("[{unit}]"));
        bar.enable_steady_tick(Duration::from_millis(100));
        spinners.insert(unit.to_string(), bar.clone());
        bar
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for ConsoleSink {
    fn line(&self, unit: &str, mode: RenderMode, line: &str) {
        match mode {
            RenderMode::Plain => self.print(format!("{} {}", format!("[{unit}]").cyan(), line)),
            RenderMode::Progress => self.spinner_for(unit).set_message(line.to_string()),
        }
    }

    fn closed(&self, unit: &str, mode: RenderMode) {
        if mode == RenderMode::Progress {
            if let Some(bar) = self.spinners().remove(unit) {
                bar.finish_and_clear();
            }
        }
    }

    fn event(&self, event: &SupervisorEvent) {
        self.print(render_event(event));
    }
}

fn render_event(event: &SupervisorEvent) -> String {
    match event {
        SupervisorEvent::BeforeStepStarted { unit, command } => format!(
            "Executing before script for [{unit}] : [ {command} ]"
        )
        .yellow()
        .bold()
        .to_string(),
        SupervisorEvent::BeforeStepFinished { unit, status } if status.success() => {
            format!("Before script for [{unit}] finished").yellow().to_string()
        }
        SupervisorEvent::BeforeStepFinished { unit, status } => format!(
            "Before script for [{unit}] failed ({status}); starting the command anyway"
        )
        .red()
        .bold()
        .to_string(),
        SupervisorEvent::EnvironmentInjected { unit, variables } => {
            let pairs: Vec<String> = variables.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!(
                "Injecting environment variables for [{unit}]: [ {} ]",
                pairs.join(", ")
            )
            .magenta()
            .bold()
            .to_string()
        }
        SupervisorEvent::UnitStarted { unit, pid } => {
            format!("[{pid}] Started {unit}").green().bold().to_string()
        }
        SupervisorEvent::SpawnFailed { unit, error } => {
            format!("Failed to start {unit}: {error}").red().bold().to_string()
        }
        SupervisorEvent::UnitExited { unit, pid, status } => {
            let text = format!("[{pid}] {unit} exited ({status})");
            if status.success() {
                text.blue().to_string()
            } else {
                text.red().to_string()
            }
        }
        SupervisorEvent::TerminationStarted { count } => {
            format!("Attempting to terminate {count} processes...")
                .red()
                .bold()
                .to_string()
        }
        SupervisorEvent::Terminated { unit, pid, outcome } => match outcome {
            TerminationOutcome::AlreadyExited => {
                format!("[{pid}] {unit} had already exited").blue().to_string()
            }
            TerminationOutcome::Graceful => format!("[{pid}] {unit} terminated gracefully")
                .green()
                .bold()
                .to_string(),
            TerminationOutcome::Forced => format!("[{pid}] {unit} killed forcefully")
                .red()
                .bold()
                .to_string(),
            TerminationOutcome::Failed(message) => {
                format!("[{pid}] Error terminating {unit}: {message}")
                    .red()
                    .bold()
                    .to_string()
            }
        },
    }
}
