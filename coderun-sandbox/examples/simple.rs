//! Simple sandbox example - run a few snippets and print the results

use coderun_sandbox::{ExecutionConfig, ExecutionRequest, SandboxService};
use std::time::Duration;

#[tokio::main]
async fn main() -> coderun_sandbox::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let work_dir = tempfile::tempdir()?;
    let config = ExecutionConfig::default()
        .with_working_directory(work_dir.path())
        .with_timeout(Duration::from_secs(2));
    let service = SandboxService::new(config)?;

    println!("=== Sandbox Service Example ===\n");
    println!("Runtime: {}\n", service.runtime_name());

    println!("Example 1: Simple echo");
    execute_and_print(&service, ExecutionRequest::new("sh", "echo 'Hello from sandbox!'")).await?;

    println!("\nExample 2: Count to 5");
    execute_and_print(
        &service,
        ExecutionRequest::new("sh", "for i in 1 2 3 4 5; do echo $i; done"),
    )
    .await?;

    println!("\nExample 3: Long running task with timeout");
    execute_and_print(&service, ExecutionRequest::new("sh", "sleep 10 && echo 'Done!'")).await?;

    println!("\nExample 4: Error to stderr");
    execute_and_print(
        &service,
        ExecutionRequest::new("sh", "echo 'Error message' >&2; exit 1"),
    )
    .await?;

    Ok(())
}

async fn execute_and_print(
    service: &SandboxService,
    request: ExecutionRequest,
) -> coderun_sandbox::Result<()> {
    let result = service.execute(request).await?;

    for line in result.combined_output().lines() {
        println!("  {}", line);
    }
    println!(
        "  Result: exit_code={} duration={}ms timed_out={}",
        result.exit_code(),
        result.execution_time().as_millis(),
        result.timed_out()
    );
    if let Some(kind) = result.error_kind() {
        println!("  Error kind: {} ({})", kind, kind.description());
    }

    Ok(())
}
