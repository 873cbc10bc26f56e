//! Maps interpreter failure text to an [`ExecutionErrorKind`]

use crate::error::ExecutionErrorKind;

const SYNTAX_MARKERS: &[&str] = &["syntaxerror", "indentationerror", "syntax error"];
const TIMEOUT_MARKERS: &[&str] = &["timeout", "time out"];
const SECURITY_MARKERS: &[&str] = &["permission", "access denied", "security"];
const ENVIRONMENT_MARKERS: &[&str] = &[
    "no module named",
    "modulenotfounderror",
    "command not found",
    ": not found",
    "cannot find module",
];

/// Classify a failed run.
///
/// Matching is case-insensitive and ordered: syntax, timeout, security,
/// environment, then a non-zero exit code falls back to a runtime error.
/// Only meaningful for failed runs.
pub fn classify(stderr: Option<&str>, exit_code: i32) -> ExecutionErrorKind {
    let text = match stderr {
        Some(text) if !text.trim().is_empty() => text.to_lowercase(),
        _ => return ExecutionErrorKind::UnknownError,
    };

    let contains_any = |markers: &[&str]| markers.iter().any(|m| text.contains(m));

    if contains_any(SYNTAX_MARKERS) {
        ExecutionErrorKind::SyntaxError
    } else if contains_any(TIMEOUT_MARKERS) {
        ExecutionErrorKind::TimeoutError
    } else if contains_any(SECURITY_MARKERS) {
        ExecutionErrorKind::SecurityError
    } else if contains_any(ENVIRONMENT_MARKERS) {
        ExecutionErrorKind::EnvironmentError
    } else if exit_code != 0 {
        ExecutionErrorKind::RuntimeError
    } else {
        ExecutionErrorKind::UnknownError
    }
}
