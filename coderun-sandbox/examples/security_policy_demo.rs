//! Security policy demonstration
//!
//! Shows the advisory disallowed-module scan. Flagged code still runs; the
//! findings land in the result metadata.

use coderun_sandbox::{ExecutionConfig, ExecutionRequest, Language, SandboxService, SecurityPolicy};

const SNIPPET: &str = "import subprocess\nimport json\nprint(json.dumps({'ok': True}))\n";

#[tokio::main]
async fn main() -> coderun_sandbox::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== Security Policy Demonstration ===\n");

    let secure = ExecutionConfig::secure();
    println!("1. Secure preset disallows: {:?}", secure.disallowed_modules);

    let policy = SecurityPolicy::from_config(&secure);
    for violation in policy.scan(Language::Python, SNIPPET) {
        println!(
            "   line {}: '{}' uses {}",
            violation.line, violation.snippet, violation.module
        );
    }

    println!("\n2. Development preset scans nothing:");
    let relaxed = SecurityPolicy::from_config(&ExecutionConfig::development());
    println!("   findings: {}", relaxed.scan(Language::Python, SNIPPET).len());

    println!("\n3. Executing with the secure preset:");
    let work_dir = tempfile::tempdir()?;
    let service = SandboxService::new(secure.with_working_directory(work_dir.path()))?;
    let result = service
        .execute(ExecutionRequest::new("python", SNIPPET))
        .await?;
    println!("   exit code: {}", result.exit_code());
    println!(
        "   security_warnings: {}",
        result
            .metadata()
            .get("security_warnings")
            .map(|w| w.to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    Ok(())
}
