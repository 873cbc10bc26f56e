//! End-to-end scenarios covering the main use cases of the engine

use assert_matches::assert_matches;
use coderun_sandbox::{
    extract, CodeBlock, ExecutionErrorKind, ExecutionRequest, SandboxError,
};
use coderun_tests::{python_available, require, setup_test_logging, sh_available, test_service};
use std::time::Duration;

/// Python hello world
#[tokio::test]
async fn scenario_a_python_hello() {
    setup_test_logging();
    require!(python_available(), "python3");
    let dir = tempfile::tempdir().unwrap();

    let result = test_service(dir.path())
        .execute(ExecutionRequest::new("python", "print('Hello')"))
        .await
        .unwrap();

    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.logs(), "Hello");
    assert!(result.is_successful());
    assert!(result.has_output());
    assert!(!result.has_error_output());
    assert!(result.execution_time() < Duration::from_secs(30));
}

/// Unhandled exception
#[tokio::test]
async fn scenario_b_unhandled_error() {
    require!(python_available(), "python3");
    let dir = tempfile::tempdir().unwrap();

    let result = test_service(dir.path())
        .execute(ExecutionRequest::new("python", "1/0"))
        .await
        .unwrap();

    assert_ne!(result.exit_code(), 0);
    assert!(result.error_output().contains("ZeroDivisionError"));
    assert_eq!(result.logs(), result.error_output());
    assert_eq!(result.error_kind(), Some(ExecutionErrorKind::RuntimeError));

    let err = result.into_error().unwrap();
    assert!(err.detailed_message().contains("ZeroDivisionError"));
}

/// Two fenced blocks
#[test]
fn scenario_c_two_fenced_blocks() {
    let text = "```python\nprint(1)\n```\nsome prose\n```javascript\nconsole.log(2)\n```";
    assert_eq!(
        extract(Some(text), true),
        vec![
            CodeBlock::new("python", "print(1)"),
            CodeBlock::new("javascript", "console.log(2)"),
        ]
    );
}

/// Direct command
#[tokio::test]
async fn scenario_d_echo_hello() {
    require!(sh_available(), "sh");
    let dir = tempfile::tempdir().unwrap();

    let result = test_service(dir.path())
        .execute_command(["echo", "Hello"])
        .await
        .unwrap();

    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.logs(), "Hello");
    assert_eq!(result.combined_output(), "Hello");
}

/// Invalid request
#[tokio::test]
async fn scenario_e_invalid_request() {
    let dir = tempfile::tempdir().unwrap();
    let service = test_service(dir.path());

    let empty = ExecutionRequest::default();
    assert!(empty.language.is_empty());
    assert!(empty.code.is_none() && empty.filename.is_none());
    assert_matches!(
        service.execute(empty).await,
        Err(SandboxError::InvalidRequest(_))
    );
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    assert_matches!(
        service.execute_command(Vec::<String>::new()).await,
        Err(SandboxError::InvalidCommand(_))
    );
}
