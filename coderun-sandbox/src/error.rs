//! Error types for the execution pipeline
//!
//! Two families live here. [`SandboxError`] covers caller bugs and setup
//! failures that are raised before any process runs. [`ExecutionError`]
//! describes a failed run after the fact and carries the classified
//! [`ExecutionErrorKind`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Closed taxonomy of execution failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionErrorKind {
    SyntaxError,
    RuntimeError,
    TimeoutError,
    SecurityError,
    EnvironmentError,
    UnknownError,
}

impl ExecutionErrorKind {
    /// Human-readable description of the kind
    pub fn description(self) -> &'static str {
        match self {
            ExecutionErrorKind::SyntaxError => "syntax error",
            ExecutionErrorKind::RuntimeError => "runtime error",
            ExecutionErrorKind::TimeoutError => "timeout error",
            ExecutionErrorKind::SecurityError => "security error",
            ExecutionErrorKind::EnvironmentError => "environment error",
            ExecutionErrorKind::UnknownError => "unknown error",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionErrorKind::SyntaxError => "SYNTAX_ERROR",
            ExecutionErrorKind::RuntimeError => "RUNTIME_ERROR",
            ExecutionErrorKind::TimeoutError => "TIMEOUT_ERROR",
            ExecutionErrorKind::SecurityError => "SECURITY_ERROR",
            ExecutionErrorKind::EnvironmentError => "ENVIRONMENT_ERROR",
            ExecutionErrorKind::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the pipeline before or around process execution
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load configuration: {0}")]
    Config(String),

    #[error("Failed to stage code at {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A failed execution, enriched with its classified kind
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ExecutionError {
    message: String,
    kind: ExecutionErrorKind,
    exit_code: i32,
    error_output: String,
}

impl ExecutionError {
    pub fn new(
        message: impl Into<String>,
        kind: ExecutionErrorKind,
        exit_code: i32,
        error_output: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            kind,
            exit_code,
            error_output: error_output.into(),
        }
    }

    pub fn kind(&self) -> ExecutionErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Raw error text reported by the interpreter
    pub fn error_output(&self) -> &str {
        &self.error_output
    }

    /// Multi-line rendering with kind, exit code and interpreter output
    pub fn detailed_message(&self) -> String {
        let mut out = format!("Execution failed: {}\n", self.message);
        out.push_str(&format!("Error kind: {}\n", self.kind.description()));
        out.push_str(&format!("Exit code: {}\n", self.exit_code));
        if !self.error_output.trim().is_empty() {
            out.push_str(&format!("Interpreter output: {}", self.error_output));
        }
        out
    }
}
