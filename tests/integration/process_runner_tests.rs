//! Integration tests for the process runtime: exit codes, stream capture,
//! timeouts and spawn failures

use assert_matches::assert_matches;
use coderun_sandbox::{
    CommandSpec, ExecutionPhase, ProcessRuntime, Runtime, SandboxError, DEFAULT_DRAIN_GRACE,
};
use coderun_tests::{require, setup_test_logging, sh_available};
use std::time::{Duration, Instant};

fn sh(script: &str, timeout: Duration) -> CommandSpec {
    CommandSpec::new(["sh", "-c", script], timeout)
}

#[tokio::test]
async fn test_echo_hello() {
    setup_test_logging();
    require!(sh_available(), "sh");

    let raw = ProcessRuntime::new()
        .run(CommandSpec::new(["echo", "Hello"], Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(raw.exit_code, 0);
    assert_eq!(raw.stdout, "Hello");
    assert!(raw.stderr.is_empty());
    assert_eq!(raw.phase, ExecutionPhase::Completed);
}

#[tokio::test]
async fn test_timeout_is_bounded() {
    setup_test_logging();
    require!(sh_available(), "sh");

    let timeout = Duration::from_millis(500);
    let started = Instant::now();
    let raw = ProcessRuntime::new()
        .run(sh("sleep 10", timeout))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(raw.timed_out);
    assert_eq!(raw.exit_code, -1);
    assert!(raw.stderr.contains("timeout"));
    assert!(
        elapsed < timeout + DEFAULT_DRAIN_GRACE + Duration::from_secs(1),
        "took {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_no_deadlock_with_large_output_on_both_streams() {
    setup_test_logging();
    require!(sh_available(), "sh");

    // Far more than a pipe buffer on each stream
    let script = "i=0; while [ $i -lt 50000 ]; do echo \"stdout line $i\"; echo \"stderr line $i\" >&2; i=$((i+1)); done";
    let raw = ProcessRuntime::new()
        .run(sh(script, Duration::from_secs(120)))
        .await
        .unwrap();
    assert!(!raw.timed_out);
    assert_eq!(raw.exit_code, 0);
    assert_eq!(raw.stdout.lines().count(), 50000);
    assert_eq!(raw.stderr.lines().count(), 50000);
    assert!(raw.stdout.ends_with("stdout line 49999"));
}

#[tokio::test]
async fn test_exit_code_passthrough() {
    require!(sh_available(), "sh");
    for code in [1, 2, 42] {
        let raw = ProcessRuntime::new()
            .run(sh(&format!("exit {}", code), Duration::from_secs(10)))
            .await
            .unwrap();
        assert_eq!(raw.exit_code, code);
        assert!(!raw.success());
    }
}

#[tokio::test]
async fn test_signal_termination_maps_to_minus_one() {
    require!(sh_available(), "sh");
    let raw = ProcessRuntime::new()
        .run(sh("kill -9 $$", Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(raw.exit_code, -1);
    assert!(!raw.timed_out);
    assert_eq!(raw.phase, ExecutionPhase::Completed);
}

#[tokio::test]
async fn test_spawn_failure_captured() {
    setup_test_logging();
    let raw = ProcessRuntime::new()
        .run(CommandSpec::new(
            ["definitely-not-a-real-program-7f3a"],
            Duration::from_secs(5),
        ))
        .await
        .unwrap();
    assert_eq!(raw.exit_code, -1);
    assert_eq!(raw.phase, ExecutionPhase::SpawnFailed);
    assert!(!raw.stderr.is_empty());
}

#[tokio::test]
async fn test_missing_work_dir_is_spawn_failure() {
    require!(sh_available(), "sh");
    let raw = ProcessRuntime::new()
        .run(
            CommandSpec::new(["echo", "x"], Duration::from_secs(5))
                .with_work_dir("/nonexistent/coderun/dir"),
        )
        .await
        .unwrap();
    assert_eq!(raw.exit_code, -1);
    assert_eq!(raw.phase, ExecutionPhase::SpawnFailed);
}

#[tokio::test]
async fn test_empty_tokens_rejected() {
    let err = ProcessRuntime::new()
        .run(CommandSpec::new(Vec::<String>::new(), Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert_matches!(err, SandboxError::InvalidCommand(_));
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    require!(sh_available(), "sh");
    let runtime = ProcessRuntime::new();
    let runs = (0..8).map(|i| {
        let runtime = runtime.clone();
        async move {
            runtime
                .run(sh(&format!("echo run-{}", i), Duration::from_secs(30)))
                .await
        }
    });
    let results = futures::future::join_all(runs).await;
    for (i, result) in results.into_iter().enumerate() {
        let raw = result.unwrap();
        assert_eq!(raw.stdout, format!("run-{}", i));
    }
}
