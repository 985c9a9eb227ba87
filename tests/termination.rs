// tests/termination.rs
mod common;
use crate::common::builders::{fast_options, WorkUnitBuilder};
use crate::common::{eventually, init_tracing, with_timeout, RecordingSink};

use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use concierge::output::SupervisorEvent;
use concierge::supervisor::Supervisor;
use concierge::types::{ProcessState, TerminationOutcome};

type TestResult = Result<(), Box<dyn Error>>;

/// True once `pid` no longer runs: either gone or a zombie awaiting reap.
fn process_is_gone(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Err(_) => true,
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_some_and(|state| state == "Z" || state == "X"),
    }
}

#[tokio::test]
async fn cooperative_process_exits_within_grace() -> TestResult {
    init_tracing();

    let sink = RecordingSink::new();
    let mut supervisor =
        Supervisor::new(Arc::new(sink.clone()), fast_options(Duration::from_secs(5)));
    supervisor
        .start(vec![WorkUnitBuilder::new("sleeper", "sleep 100").build()])
        .await;

    let started = Instant::now();
    let report = with_timeout(supervisor.terminate_all()).await;

    assert_eq!(report.outcome_of("sleeper"), Some(&TerminationOutcome::Graceful));
    assert!(started.elapsed() < Duration::from_secs(4));
    let handle = supervisor.handle("sleeper").expect("handle");
    assert_eq!(handle.state(), ProcessState::Exited);

    let events = sink.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, SupervisorEvent::TerminationStarted { count: 1 })));
    assert!(events.iter().any(|e| matches!(
        e,
        SupervisorEvent::Terminated { unit, outcome: TerminationOutcome::Graceful, .. }
            if unit == "sleeper"
    )));
    // A terminated unit is not reported as a natural exit.
    assert!(!events
        .iter()
        .any(|e| matches!(e, SupervisorEvent::UnitExited { .. })));
    Ok(())
}

#[tokio::test]
async fn term_ignoring_process_is_killed_after_grace() -> TestResult {
    init_tracing();

    let grace = Duration::from_millis(300);
    let mut supervisor = Supervisor::new(Arc::new(RecordingSink::new()), fast_options(grace));
    supervisor
        .start(vec![WorkUnitBuilder::new("stubborn", "trap '' TERM; sleep 100").build()])
        .await;
    // Let the shell install its trap before we signal it.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    let report = with_timeout(supervisor.terminate_all()).await;

    assert_eq!(report.outcome_of("stubborn"), Some(&TerminationOutcome::Forced));
    assert!(started.elapsed() >= grace);
    let handle = supervisor.handle("stubborn").expect("handle");
    assert_eq!(handle.state(), ProcessState::Killed);
    Ok(())
}

#[tokio::test]
async fn bounded_kill_wait_still_reports_forced() -> TestResult {
    init_tracing();

    let mut options = fast_options(Duration::from_millis(200));
    options.kill_timeout = Some(Duration::from_secs(2));
    let mut supervisor = Supervisor::new(Arc::new(RecordingSink::new()), options);
    supervisor
        .start(vec![WorkUnitBuilder::new("stubborn", "trap '' TERM; sleep 100").build()])
        .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let report = with_timeout(supervisor.terminate_all()).await;

    assert_eq!(report.outcome_of("stubborn"), Some(&TerminationOutcome::Forced));
    Ok(())
}

#[tokio::test]
async fn whole_process_group_is_signalled() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let mut supervisor = Supervisor::new(
        Arc::new(RecordingSink::new()),
        fast_options(Duration::from_millis(500)),
    );
    supervisor
        .start(vec![WorkUnitBuilder::new(
            "tree",
            "sleep 100 & echo $! > child.pid; wait",
        )
        .cwd(dir.path())
        .build()])
        .await;

    let pid_file = dir.path().join("child.pid");
    assert!(eventually(Duration::from_secs(5), || pid_file.exists()).await);
    let child_pid: u32 = std::fs::read_to_string(&pid_file)?.trim().parse()?;
    assert!(!process_is_gone(child_pid));

    let report = with_timeout(supervisor.terminate_all()).await;
    assert!(!report.outcome_of("tree").is_some_and(TerminationOutcome::is_failure));

    assert!(
        eventually(Duration::from_secs(5), || process_is_gone(child_pid)).await,
        "background child {child_pid} survived termination"
    );
    Ok(())
}

#[tokio::test]
async fn already_exited_units_are_not_signalled() -> TestResult {
    init_tracing();

    let mut supervisor = Supervisor::new(
        Arc::new(RecordingSink::new()),
        fast_options(Duration::from_millis(500)),
    );
    supervisor
        .start(vec![
            WorkUnitBuilder::new("done", "true").build(),
            WorkUnitBuilder::new("busy", "sleep 100").build(),
        ])
        .await;

    let done = Arc::clone(supervisor.handle("done").expect("handle"));
    assert!(eventually(Duration::from_secs(5), || done.state() == ProcessState::Exited).await);

    let report = with_timeout(supervisor.terminate_all()).await;

    assert_eq!(report.outcome_of("done"), Some(&TerminationOutcome::AlreadyExited));
    assert_eq!(report.outcome_of("busy"), Some(&TerminationOutcome::Graceful));
    Ok(())
}

#[tokio::test]
async fn second_sweep_is_idempotent() -> TestResult {
    init_tracing();

    let sink = RecordingSink::new();
    let mut supervisor = Supervisor::new(
        Arc::new(sink.clone()),
        fast_options(Duration::from_millis(500)),
    );
    supervisor
        .start(vec![
            WorkUnitBuilder::new("a", "sleep 100").build(),
            WorkUnitBuilder::new("b", "sleep 100").build(),
        ])
        .await;

    let first = with_timeout(supervisor.terminate_all()).await;
    assert_eq!(first.failures().count(), 0);

    let second = with_timeout(supervisor.terminate_all()).await;
    assert_eq!(second.entries.len(), 2);
    for entry in &second.entries {
        assert_eq!(entry.outcome, TerminationOutcome::AlreadyExited, "{}", entry.name);
    }
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, SupervisorEvent::TerminationStarted { count: 0 })));
    Ok(())
}

#[tokio::test]
async fn many_units_terminate_concurrently() -> TestResult {
    init_tracing();

    let grace = Duration::from_millis(400);
    let mut supervisor = Supervisor::new(Arc::new(RecordingSink::new()), fast_options(grace));
    let units = (0..4)
        .map(|i| WorkUnitBuilder::new(&format!("stubborn-{i}"), "trap '' TERM; sleep 100").build())
        .collect();
    supervisor.start(units).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    let report = with_timeout(supervisor.terminate_all()).await;

    assert_eq!(report.entries.len(), 4);
    assert!(report
        .entries
        .iter()
        .all(|e| e.outcome == TerminationOutcome::Forced));
    // Sequential escalation would take at least four grace periods.
    assert!(started.elapsed() < grace * 3, "took {:?}", started.elapsed());
    Ok(())
}

#[tokio::test]
async fn abandoned_sweep_returns_early_and_finishes_in_background() -> TestResult {
    init_tracing();

    let mut supervisor = Supervisor::new(
        Arc::new(RecordingSink::new()),
        fast_options(Duration::from_secs(1)),
    );
    supervisor
        .start(vec![WorkUnitBuilder::new("stubborn", "trap '' TERM; sleep 100").build()])
        .await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    let report = with_timeout(
        supervisor.terminate_all_unless(tokio::time::sleep(Duration::from_millis(100))),
    )
    .await;

    assert!(report.is_none());
    assert!(started.elapsed() < Duration::from_millis(900));

    let handle = Arc::clone(supervisor.handle("stubborn").expect("handle"));
    assert!(
        eventually(Duration::from_secs(5), || handle.state() == ProcessState::Killed).await,
        "state is {}",
        handle.state()
    );
    Ok(())
}
