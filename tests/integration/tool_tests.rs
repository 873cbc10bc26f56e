//! The python_execute tool layer

use coderun_sandbox::{CodeExecutionTool, ExecutionConfig, SandboxService, TOOL_NAME};
use coderun_tests::{list_files, python_available, require, setup_test_logging, test_config};
use serde_json::json;
use std::sync::Arc;

fn tool(config: ExecutionConfig) -> CodeExecutionTool {
    CodeExecutionTool::new(Arc::new(SandboxService::new(config).unwrap()))
}

#[test]
fn test_definition_shape() {
    let dir = tempfile::tempdir().unwrap();
    let definition = tool(test_config(dir.path())).definition();
    assert_eq!(definition["name"], TOOL_NAME);
    assert_eq!(definition["parameters"]["type"], "object");
    assert_eq!(definition["parameters"]["required"], json!(["code"]));
    for key in ["code", "filename", "work_dir"] {
        assert_eq!(definition["parameters"]["properties"][key]["type"], "string");
    }
}

#[tokio::test]
async fn test_blank_code_fails_without_running() {
    let dir = tempfile::tempdir().unwrap();
    let output = tool(test_config(dir.path())).run("   ").await;
    assert!(!output.success);
    assert!(output.result.is_none());
    assert!(list_files(dir.path()).is_empty());
}

#[tokio::test]
async fn test_json_input_success() {
    setup_test_logging();
    require!(python_available(), "python3");
    let dir = tempfile::tempdir().unwrap();
    let output = tool(test_config(dir.path()))
        .run(r#"{"code": "print(6 * 7)"}"#)
        .await;
    assert!(output.success);
    assert_eq!(output.output, "42");
    assert_eq!(output.result.unwrap().exit_code(), 0);
}

#[tokio::test]
async fn test_raw_code_without_output() {
    require!(python_available(), "python3");
    let dir = tempfile::tempdir().unwrap();
    let output = tool(test_config(dir.path())).run("x = 1").await;
    assert!(output.success);
    assert!(output.output.contains("no output"));
}

#[tokio::test]
async fn test_failure_report() {
    require!(python_available(), "python3");
    let dir = tempfile::tempdir().unwrap();
    let output = tool(test_config(dir.path()))
        .run(r#"{"code": "raise ValueError('boom')"}"#)
        .await;
    assert!(!output.success);
    assert!(output.output.contains("exit code: 1"));
    assert!(output.output.contains("ValueError: boom"));
    assert!(output.output.contains("Execution time:"));
}

#[tokio::test]
async fn test_work_dir_and_filename_params() {
    require!(python_available(), "python3");
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("custom");
    let config = test_config(dir.path()).with_keep_temp_files(true);
    let input = json!({
        "code": "print('in custom dir')",
        "filename": "hello",
        "work_dir": target.to_string_lossy(),
    })
    .to_string();

    let output = tool(config).run(&input).await;
    assert!(output.success);
    assert!(target.join("hello.py").exists());
}
