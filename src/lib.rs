// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod output;
pub mod supervisor;
pub mod types;
pub mod unit;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command, RunArgs};
use crate::config::{ConfigFile, ConfigSource, FileConfigSource};
use crate::output::{ConsoleSink, OutputSink};
use crate::supervisor::{Supervisor, SupervisorOptions};

pub use crate::exec::ProcessHandle;
pub use crate::supervisor::{StartReport, TerminationReport};
pub use crate::types::{ProcessState, RenderMode, TerminationOutcome};
pub use crate::unit::WorkUnit;

/// How long to keep collecting output after the processes are gone.
const OUTPUT_FLUSH_LIMIT: Duration = Duration::from_secs(1);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the supervisor and its console sink
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Run(run_args) => run_config(run_args).await,
    }
}

async fn run_config(args: RunArgs) -> Result<()> {
    let source = FileConfigSource::new(&args.config);
    let cfg = source.load_config()?;
    info!(
        count = cfg.units.len(),
        config = %source.path().display(),
        "loaded work units"
    );

    if args.dry_run {
        print_dry_run(&cfg, source.path());
        return Ok(());
    }

    // Registered before launching so an early Ctrl-C is held until every
    // launch has finished, rather than killing us mid-startup.
    let mut interrupt =
        signal(SignalKind::interrupt()).context("installing Ctrl-C handler")?;

    let sink: Arc<dyn OutputSink> = Arc::new(ConsoleSink::new());
    let mut supervisor = Supervisor::new(sink, SupervisorOptions::from(&cfg.settings));

    let report = supervisor.start(cfg.units).await;
    let failed = report.failures().count();
    if report.running().next().is_none() {
        bail!("none of the {failed} work units could be started");
    }
    if failed > 0 {
        warn!(failed, "some work units failed to start; continuing with the rest");
    }

    let interrupted = tokio::select! {
        _ = interrupt.recv() => true,
        _ = supervisor.wait_all() => false,
    };

    if interrupted {
        info!("interrupt received; terminating processes (Ctrl-C again to give up waiting)");
        let Some(report) = supervisor.terminate_all_unless(interrupt.recv()).await else {
            bail!("interrupted again during shutdown; some processes may still be running");
        };
        for entry in report.failures() {
            warn!(unit = %entry.name, pid = entry.pid, outcome = ?entry.outcome, "process may still be running");
        }
    } else {
        info!("all work units exited");
    }

    supervisor.flush_output(OUTPUT_FLUSH_LIMIT).await;
    debug!("run complete");
    Ok(())
}

/// Simple dry-run output: print settings and every unit.
fn print_dry_run(cfg: &ConfigFile, path: &Path) {
    println!("concierge dry-run ({})", path.display());
    println!("  config.grace_period = {:?}", cfg.settings.grace_period);
    match cfg.settings.kill_timeout {
        Some(limit) => println!("  config.kill_timeout = {:?}", limit),
        None => println!("  config.kill_timeout = none"),
    }
    println!("  config.stdout_mode = {:?}", cfg.settings.stdout_mode);
    println!("  config.stderr_mode = {:?}", cfg.settings.stderr_mode);
    println!();

    println!("work ({}):", cfg.units.len());
    for unit in &cfg.units {
        println!("  - {}", unit.name());
        println!("      cmd: {}", unit.command());
        println!("      cwd: {}", unit.working_directory().display());
        if let Some(before) = unit.before_command() {
            println!("      before: {before}");
        }
        if let Some(env) = unit.environment() {
            for (key, value) in env {
                println!("      env: {key}={value}");
            }
        }
    }

    debug!("dry-run complete (nothing started)");
}
