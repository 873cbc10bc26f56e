//! End-to-end pipeline tests through `SandboxService`

use assert_matches::assert_matches;
use coderun_sandbox::{
    ExecutionConfig, ExecutionErrorKind, ExecutionRequest, SandboxError, SandboxService,
};
use coderun_tests::{
    list_files, python_available, require, setup_test_logging, sh_available, test_config,
    test_service,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_shell_success_and_cleanup() {
    setup_test_logging();
    require!(sh_available(), "sh");
    let dir = tempfile::tempdir().unwrap();
    let service = test_service(dir.path());

    let result = service
        .execute(ExecutionRequest::new("sh", "echo one\necho two"))
        .await
        .unwrap();

    assert!(result.is_successful());
    assert_eq!(result.logs(), "one\ntwo");
    assert!(result.start_time() <= result.end_time());
    assert_eq!(result.metadata()["phase"], "COMPLETED");
    assert!(list_files(dir.path()).is_empty(), "staged file left behind");
}

#[tokio::test]
async fn test_failure_exclusivity() {
    require!(sh_available(), "sh");
    let dir = tempfile::tempdir().unwrap();
    let service = test_service(dir.path());

    for (script, ok) in [("exit 0", true), ("exit 3", false), ("echo oops >&2; exit 1", false)] {
        let result = service
            .execute(ExecutionRequest::new("sh", script))
            .await
            .unwrap();
        assert_eq!(result.is_successful(), ok);
        assert_ne!(result.is_successful(), result.is_failed());
        assert_eq!(result.error_kind().is_none(), ok);
    }
}

#[tokio::test]
async fn test_command_not_found_is_environment_error() {
    require!(sh_available(), "sh");
    let dir = tempfile::tempdir().unwrap();
    let result = test_service(dir.path())
        .execute(ExecutionRequest::new("sh", "no-such-command-coderun-xyz"))
        .await
        .unwrap();
    assert_eq!(result.exit_code(), 127);
    assert_eq!(
        result.error_kind(),
        Some(ExecutionErrorKind::EnvironmentError)
    );
}

#[tokio::test]
async fn test_timeout_cleans_up_and_classifies() {
    setup_test_logging();
    require!(sh_available(), "sh");
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path()).with_timeout(Duration::from_millis(400));
    let service = SandboxService::new(config).unwrap();

    let result = service
        .execute(ExecutionRequest::new("sh", "echo before; sleep 30"))
        .await
        .unwrap();

    assert!(result.timed_out());
    assert_eq!(result.exit_code(), -1);
    assert_eq!(result.error_kind(), Some(ExecutionErrorKind::TimeoutError));
    assert_eq!(result.metadata()["timed_out"], true);
    assert!(result.execution_time() < Duration::from_secs(4));
    assert!(list_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_cancellation() {
    require!(sh_available(), "sh");
    let dir = tempfile::tempdir().unwrap();
    let service = test_service(dir.path());
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let result = service
        .execute_with_cancellation(ExecutionRequest::new("sh", "sleep 30"), token)
        .await
        .unwrap();
    assert!(result.is_failed());
    assert!(!result.timed_out());
    assert_eq!(result.metadata()["phase"], "CANCELLED");
    assert_eq!(result.error_kind(), Some(ExecutionErrorKind::TimeoutError));
}

#[tokio::test]
async fn test_keep_temp_files() {
    require!(sh_available(), "sh");
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path()).with_keep_temp_files(true);
    let service = SandboxService::new(config).unwrap();

    let result = service
        .execute(ExecutionRequest::new("sh", "echo kept"))
        .await
        .unwrap();
    let staged = result.temp_file_path().unwrap();
    assert!(staged.exists());
    let name = staged.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("tmp_code_") && name.ends_with(".sh"));
}

#[tokio::test]
async fn test_existing_file_runs_in_place() {
    require!(sh_available(), "sh");
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("job.sh"), "echo from file").unwrap();

    let result = test_service(dir.path())
        .execute(ExecutionRequest::from_file("sh", "job"))
        .await
        .unwrap();
    assert_eq!(result.logs(), "from file");
    assert!(dir.path().join("job.sh").exists());
}

#[tokio::test]
async fn test_output_truncated_to_max_length() {
    require!(sh_available(), "sh");
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path()).with_max_output_length(100);
    let service = SandboxService::new(config).unwrap();

    let result = service
        .execute(ExecutionRequest::new(
            "sh",
            "i=0; while [ $i -lt 100 ]; do echo 0123456789; i=$((i+1)); done",
        ))
        .await
        .unwrap();
    assert!(result.is_successful());
    assert!(result.logs().contains("[output truncated: "));
    assert!(result.logs().chars().count() < 200);
}

#[tokio::test]
async fn test_environment_variables_applied() {
    require!(sh_available(), "sh");
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path()).with_env("CODERUN_GREETING", "hi there");
    let result = SandboxService::new(config)
        .unwrap()
        .execute(ExecutionRequest::new("sh", "echo \"$CODERUN_GREETING\""))
        .await
        .unwrap();
    assert_eq!(result.logs(), "hi there");
}

#[tokio::test]
async fn test_timing_monotonic() {
    require!(sh_available(), "sh");
    let dir = tempfile::tempdir().unwrap();
    let service = test_service(dir.path());
    for script in ["true", "false", "sleep 0.1"] {
        let result = service
            .execute(ExecutionRequest::new("sh", script))
            .await
            .unwrap();
        assert!(result.start_time() <= result.end_time());
        assert_eq!(
            result.execution_time(),
            (result.end_time() - result.start_time()).to_std().unwrap()
        );
    }
}

#[tokio::test]
async fn test_invalid_requests() {
    let dir = tempfile::tempdir().unwrap();
    let service = test_service(dir.path());

    let missing_both = ExecutionRequest {
        language: "python".to_string(),
        ..Default::default()
    };
    assert_matches!(
        service.execute(missing_both).await,
        Err(SandboxError::InvalidRequest(_))
    );
    assert_matches!(
        service.execute(ExecutionRequest::new("brainfuck", "+")).await,
        Err(SandboxError::UnsupportedLanguage(lang)) if lang == "brainfuck"
    );
    assert_matches!(
        service.execute(ExecutionRequest::new("java", "class A {}")).await,
        Err(SandboxError::UnsupportedOperation(_))
    );
    assert!(list_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_python_syntax_error() {
    setup_test_logging();
    require!(python_available(), "python3");
    let dir = tempfile::tempdir().unwrap();
    let result = test_service(dir.path())
        .execute(ExecutionRequest::new("python", "def broken(:\n    pass"))
        .await
        .unwrap();
    assert!(result.is_failed());
    assert_eq!(result.error_kind(), Some(ExecutionErrorKind::SyntaxError));
}

#[tokio::test]
async fn test_python_missing_module() {
    require!(python_available(), "python3");
    let dir = tempfile::tempdir().unwrap();
    let result = test_service(dir.path())
        .execute(ExecutionRequest::new("py", "import coderun_no_such_module"))
        .await
        .unwrap();
    assert_eq!(
        result.error_kind(),
        Some(ExecutionErrorKind::EnvironmentError)
    );
}

#[tokio::test]
async fn test_secure_preset_flags_but_runs() {
    require!(python_available(), "python3");
    let dir = tempfile::tempdir().unwrap();
    let config = ExecutionConfig::secure().with_working_directory(dir.path());
    let result = SandboxService::new(config)
        .unwrap()
        .execute(ExecutionRequest::new("python", "import sys\nprint('ran')"))
        .await
        .unwrap();
    assert!(result.is_successful());
    assert_eq!(result.logs(), "ran");
    assert_eq!(result.metadata()["security_warnings"][0]["module"], "sys");
}

#[tokio::test]
async fn test_identical_code_runs_concurrently() {
    require!(sh_available(), "sh");
    let dir = tempfile::tempdir().unwrap();
    let service = test_service(dir.path());

    let runs = (0..64).map(|_| service.execute(ExecutionRequest::new("sh", "echo ok")));
    let results = futures::future::join_all(runs).await;

    for result in results {
        let result = result.unwrap();
        assert!(result.is_successful(), "failed: {}", result.logs());
        assert_eq!(result.logs(), "ok");
    }
    assert!(list_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_background_job_output_is_kept() {
    require!(sh_available(), "sh");
    let dir = tempfile::tempdir().unwrap();
    let result = test_service(dir.path())
        .execute(ExecutionRequest::new("sh", "echo hello; sleep 3 &"))
        .await
        .unwrap();
    assert!(result.is_successful());
    assert_eq!(result.logs(), "hello");
}
