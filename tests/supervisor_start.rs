// tests/supervisor_start.rs
mod common;
use crate::common::builders::{fast_options, WorkUnitBuilder};
use crate::common::{eventually, init_tracing, with_timeout, RecordingSink};

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use concierge::errors::ConciergeError;
use concierge::output::SupervisorEvent;
use concierge::supervisor::Supervisor;
use concierge::types::{ProcessState, RenderMode};

type TestResult = Result<(), Box<dyn Error>>;

fn supervisor_with(sink: &RecordingSink) -> Supervisor {
    Supervisor::new(Arc::new(sink.clone()), fast_options(Duration::from_millis(500)))
}

#[tokio::test]
async fn one_entry_per_unit_and_failures_are_isolated() -> TestResult {
    init_tracing();

    let sink = RecordingSink::new();
    let mut supervisor = supervisor_with(&sink);

    let report = supervisor
        .start(vec![
            WorkUnitBuilder::new("ok-1", "sleep 30").build(),
            WorkUnitBuilder::new("broken", "sleep 30")
                .cwd("/definitely/not/a/dir")
                .build(),
            WorkUnitBuilder::new("ok-2", "sleep 30").build(),
        ])
        .await;

    let names: Vec<&str> = report.units.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["ok-1", "broken", "ok-2"]);
    assert_eq!(report.running().count(), 2);

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "broken");
    assert!(matches!(failures[0].1, ConciergeError::SpawnError { .. }));

    assert_eq!(supervisor.handles().len(), 2);
    assert!(supervisor.handle("broken").is_none());
    for handle in supervisor.handles() {
        assert_eq!(handle.state(), ProcessState::Running);
        assert_eq!(handle.output_task_count(), 2);
        assert!(handle.pid() > 0);
    }

    assert!(sink.events().iter().any(|e| matches!(
        e,
        SupervisorEvent::SpawnFailed { unit, .. } if unit == "broken"
    )));

    supervisor.terminate_all().await;
    Ok(())
}

#[tokio::test]
async fn stdout_and_stderr_are_drained_in_their_modes() -> TestResult {
    init_tracing();

    let sink = RecordingSink::new();
    let mut supervisor = supervisor_with(&sink);

    supervisor
        .start(vec![WorkUnitBuilder::new(
            "talker",
            "echo out-1; echo err-1 >&2; echo out-2",
        )
        .build()])
        .await;

    with_timeout(supervisor.wait_all()).await;
    supervisor.flush_output(Duration::from_secs(2)).await;

    assert_eq!(
        sink.lines_for("talker", RenderMode::Plain),
        vec!["out-1", "out-2"]
    );
    assert_eq!(sink.lines_for("talker", RenderMode::Progress), vec!["err-1"]);

    let mut closed = sink.closed_for("talker");
    closed.sort_by_key(|m| *m == RenderMode::Progress);
    assert_eq!(closed, vec![RenderMode::Plain, RenderMode::Progress]);

    let handle = supervisor.handle("talker").expect("handle");
    assert_eq!(handle.state(), ProcessState::Exited);
    assert_eq!(handle.output_task_count(), 0, "flush collects the tasks");
    Ok(())
}

#[tokio::test]
async fn large_output_does_not_block_the_child() -> TestResult {
    init_tracing();

    let sink = RecordingSink::new();
    let mut supervisor = supervisor_with(&sink);

    // Well past a 64 KiB pipe buffer on both streams.
    supervisor
        .start(vec![WorkUnitBuilder::new(
            "flood",
            "i=0; while [ $i -lt 5000 ]; do echo line-$i-xxxxxxxxxxxxxxxx; echo err-$i-xxxxxxxxxxxxxxxx >&2; i=$((i+1)); done",
        )
        .build()])
        .await;

    with_timeout(supervisor.wait_all()).await;
    supervisor.flush_output(Duration::from_secs(5)).await;

    assert_eq!(sink.lines_for("flood", RenderMode::Plain).len(), 5000);
    assert_eq!(sink.lines_for("flood", RenderMode::Progress).len(), 5000);
    Ok(())
}

#[tokio::test]
async fn before_step_finishes_first_even_when_it_fails() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let sink = RecordingSink::new();
    let mut supervisor = supervisor_with(&sink);

    supervisor
        .start(vec![WorkUnitBuilder::new("gated", "cat marker > seen")
            .cwd(dir.path())
            .before("sleep 0.3; echo prepared > marker; exit 7")
            .build()])
        .await;

    let handle = supervisor.handle("gated").expect("main command still launched");
    assert_eq!(handle.before_status().and_then(|s| s.code()), Some(7));

    with_timeout(handle.wait()).await?;
    let seen = std::fs::read_to_string(dir.path().join("seen"))?;
    assert_eq!(seen.trim(), "prepared");

    let events = sink.events();
    let before_done = events
        .iter()
        .position(|e| matches!(e, SupervisorEvent::BeforeStepFinished { .. }))
        .expect("before-step finished event");
    let started = events
        .iter()
        .position(|e| matches!(e, SupervisorEvent::UnitStarted { .. }))
        .expect("unit started event");
    assert!(before_done < started);
    Ok(())
}

#[tokio::test]
async fn environment_overrides_reach_the_command_but_not_the_before_step() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let parent_path = std::env::var("PATH")?;
    let sink = RecordingSink::new();
    let mut supervisor = supervisor_with(&sink);

    supervisor
        .start(vec![WorkUnitBuilder::new(
            "env",
            "echo \"$CONCIERGE_TEST_EXT\"; echo \"${CONCIERGE_TEST_FLAG:-unset}\"",
        )
        .cwd(dir.path())
        .before("echo \"${CONCIERGE_TEST_FLAG:-unset}\" > before.txt")
        .env("CONCIERGE_TEST_EXT", "$PATH:/opt/extra")
        .env("CONCIERGE_TEST_FLAG", "on")
        .build()])
        .await;

    with_timeout(supervisor.wait_all()).await;
    supervisor.flush_output(Duration::from_secs(2)).await;

    assert_eq!(
        sink.lines_for("env", RenderMode::Plain),
        vec![format!("{parent_path}:/opt/extra"), "on".to_string()]
    );
    let before = std::fs::read_to_string(dir.path().join("before.txt"))?;
    assert_eq!(before.trim(), "unset");

    assert!(sink.events().iter().any(|e| matches!(
        e,
        SupervisorEvent::EnvironmentInjected { unit, variables }
            if unit == "env" && variables["CONCIERGE_TEST_FLAG"] == "on"
    )));
    Ok(())
}

#[tokio::test]
async fn natural_exit_is_observed_without_termination() -> TestResult {
    init_tracing();

    let sink = RecordingSink::new();
    let mut supervisor = supervisor_with(&sink);

    supervisor
        .start(vec![WorkUnitBuilder::new("quick", "exit 3").build()])
        .await;

    let handle = Arc::clone(supervisor.handle("quick").expect("handle"));
    assert!(eventually(Duration::from_secs(5), || handle.state() == ProcessState::Exited).await);
    assert_eq!(handle.exit_status().and_then(|s| s.code()), Some(3));
    assert!(sink.events().iter().any(|e| matches!(
        e,
        SupervisorEvent::UnitExited { unit, .. } if unit == "quick"
    )));
    Ok(())
}
