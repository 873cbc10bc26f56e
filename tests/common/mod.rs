//! Common test utilities shared across integration and E2E tests

use coderun_sandbox::{ExecutionConfig, SandboxService};
use std::path::Path;
use std::time::Duration;

/// Setup logging for tests
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Whether a Python 3 interpreter is on PATH. Python scenarios are skipped
/// without one.
pub fn python_available() -> bool {
    which::which("python3").is_ok()
}

/// Whether POSIX `sh` is on PATH
pub fn sh_available() -> bool {
    which::which("sh").is_ok()
}

/// Default config rooted in `dir` with a short timeout
pub fn test_config(dir: &Path) -> ExecutionConfig {
    ExecutionConfig::default()
        .with_working_directory(dir)
        .with_timeout(Duration::from_secs(30))
}

/// Service over [`test_config`]
pub fn test_service(dir: &Path) -> SandboxService {
    SandboxService::new(test_config(dir)).expect("test config is valid")
}

/// Files currently in `dir`, sorted
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Skip the calling test when `$cond` is false
#[macro_export]
macro_rules! require {
    ($cond:expr, $what:expr) => {
        if !$cond {
            eprintln!("skipping: {} not available", $what);
            return;
        }
    };
}
