//! Core types for code execution

use crate::classifier;
use crate::error::{ExecutionError, ExecutionErrorKind, SandboxError};
use crate::execution::ExecutionPhase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Separator placed between logs and error output in [`ExecutionResult::combined_output`]
pub const ERROR_SEPARATOR: &str = "\n--- ERROR ---\n";

/// Key in `extra_params` that overrides the working directory for one call
pub const WORK_DIR_PARAM: &str = "work_dir";

/// Request to execute code
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Source text to stage and run
    pub code: Option<String>,

    /// File name inside the working directory
    pub filename: Option<String>,

    /// Language tag, e.g. `python` or `sh`
    pub language: String,

    pub work_dir: Option<PathBuf>,

    #[serde(default)]
    pub extra_params: HashMap<String, Value>,
}

impl ExecutionRequest {
    /// Create a request for a code snippet
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            language: language.into(),
            ..Default::default()
        }
    }

    /// Create a request for a file that already exists in the working directory
    pub fn from_file(language: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            language: language.into(),
            ..Default::default()
        }
    }

    /// Set the file name the code is staged under
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Set the working directory
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    /// Add an extra parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> Result<(), SandboxError> {
        if self.language.trim().is_empty() {
            return Err(SandboxError::InvalidRequest(
                "language must not be empty".to_string(),
            ));
        }
        let has_code = self.code.is_some();
        let has_file = self
            .filename
            .as_deref()
            .map(|f| !f.trim().is_empty())
            .unwrap_or(false);
        if !has_code && !has_file {
            return Err(SandboxError::InvalidRequest(
                "either code or filename is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Working directory for this request: the `work_dir` extra parameter,
    /// then the request's own directory, then `default`.
    pub fn effective_work_dir(&self, default: &Path) -> PathBuf {
        self.extra_params
            .get(WORK_DIR_PARAM)
            .and_then(Value::as_str)
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| self.work_dir.clone())
            .unwrap_or_else(|| default.to_path_buf())
    }
}

/// A concrete process invocation
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program followed by its arguments
    pub tokens: Vec<String>,
    pub work_dir: Option<PathBuf>,
    /// Merged over the inherited environment
    pub env: HashMap<String, String>,
    pub timeout: Duration,
    /// Maximum bytes retained per stream
    pub capture_limit: Option<usize>,
    /// Address-space limit applied on Unix
    pub memory_limit_mb: Option<u64>,
    pub cancel: Option<CancellationToken>,
}

impl CommandSpec {
    pub fn new<I, S>(tokens: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            work_dir: None,
            env: HashMap::new(),
            timeout,
            capture_limit: None,
            memory_limit_mb: None,
            cancel: None,
        }
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_envs(mut self, env: &HashMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn with_capture_limit(mut self, bytes: usize) -> Self {
        self.capture_limit = Some(bytes);
        self
    }

    pub fn with_memory_limit_mb(mut self, mb: u64) -> Self {
        self.memory_limit_mb = Some(mb);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Command line for logs
    pub fn display(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Raw outcome of one supervised process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResult {
    /// Process exit code, `-1` when the process was killed, could not be
    /// spawned, or its output could not be read
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub phase: ExecutionPhase,
}

impl RawResult {
    /// Result for a process that never started
    pub fn spawn_failed(message: impl Into<String>) -> Self {
        Self {
            exit_code: -1,
            stdout: String::new(),
            stderr: message.into(),
            timed_out: false,
            phase: ExecutionPhase::SpawnFailed,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Truncate `text` to `max_chars` characters, appending a marker with the
/// number of characters dropped.
pub fn truncate_output(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str(&format!(
        "\n... [output truncated: {} more characters]",
        total - max_chars
    ));
    out
}

/// Outcome of an execution. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    exit_code: i32,
    logs: String,
    error_output: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    memory_usage_mb: u64,
    temp_file_path: Option<PathBuf>,
    executed_code: Option<String>,
    image: Option<String>,
    metadata: HashMap<String, Value>,
    timed_out: bool,
    error_kind: Option<ExecutionErrorKind>,
}

impl ExecutionResult {
    pub fn builder() -> ExecutionResultBuilder {
        ExecutionResultBuilder::default()
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn logs(&self) -> &str {
        &self.logs
    }

    pub fn error_output(&self) -> &str {
        &self.error_output
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Wall-clock time between acceptance and completion
    pub fn execution_time(&self) -> Duration {
        (self.end_time - self.start_time)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Best-effort memory usage, zero when unmeasured
    pub fn memory_usage_mb(&self) -> u64 {
        self.memory_usage_mb
    }

    pub fn temp_file_path(&self) -> Option<&Path> {
        self.temp_file_path.as_deref()
    }

    pub fn executed_code(&self) -> Option<&str> {
        self.executed_code.as_deref()
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn is_successful(&self) -> bool {
        self.exit_code == 0
    }

    pub fn is_failed(&self) -> bool {
        !self.is_successful()
    }

    pub fn has_output(&self) -> bool {
        !self.logs.trim().is_empty()
    }

    pub fn has_error_output(&self) -> bool {
        !self.error_output.trim().is_empty()
    }

    /// Logs and error output joined by a separator line
    pub fn combined_output(&self) -> String {
        let mut out = String::new();
        if self.has_output() {
            out.push_str(&self.logs);
        }
        if self.has_error_output() {
            if self.has_output() {
                out.push_str(ERROR_SEPARATOR);
            }
            out.push_str(&self.error_output);
        }
        out
    }

    /// Classified failure kind, `None` on success
    pub fn error_kind(&self) -> Option<ExecutionErrorKind> {
        if self.is_successful() {
            None
        } else {
            self.error_kind
        }
    }

    /// Convert a failed result into an [`ExecutionError`]
    pub fn into_error(self) -> Option<ExecutionError> {
        let kind = self.error_kind()?;
        let message = if self.timed_out {
            "execution timed out".to_string()
        } else {
            format!("execution failed with exit code {}", self.exit_code)
        };
        Some(ExecutionError::new(
            message,
            kind,
            self.exit_code,
            self.error_output,
        ))
    }

    /// Human-readable digest
    pub fn summary(&self) -> String {
        let status = if self.is_successful() {
            "SUCCESS"
        } else {
            "FAILED"
        };
        let mut out = String::from("Execution Summary:\n");
        out.push_str(&format!("  Status: {}\n", status));
        out.push_str(&format!("  Exit Code: {}\n", self.exit_code));
        out.push_str(&format!(
            "  Execution Time: {} ms\n",
            self.execution_time().as_millis()
        ));
        if self.memory_usage_mb > 0 {
            out.push_str(&format!("  Memory Usage: {} MB\n", self.memory_usage_mb));
        }
        if let Some(kind) = self.error_kind() {
            out.push_str(&format!("  Error Kind: {}\n", kind));
        }
        out.push_str(&format!(
            "  Output Length: {} characters\n",
            self.logs.chars().count()
        ));
        out.push_str(&format!(
            "  Error Output Length: {} characters",
            self.error_output.chars().count()
        ));
        out
    }
}

/// Assembles an [`ExecutionResult`], classifying failures on build
#[derive(Debug, Default)]
pub struct ExecutionResultBuilder {
    exit_code: i32,
    logs: String,
    error_output: String,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    memory_usage_mb: u64,
    temp_file_path: Option<PathBuf>,
    executed_code: Option<String>,
    image: Option<String>,
    metadata: HashMap<String, Value>,
    timed_out: bool,
    max_output_length: Option<usize>,
}

impl ExecutionResultBuilder {
    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn logs(mut self, logs: impl Into<String>) -> Self {
        self.logs = logs.into();
        self
    }

    pub fn error_output(mut self, error_output: impl Into<String>) -> Self {
        self.error_output = error_output.into();
        self
    }

    pub fn start_time(mut self, time: DateTime<Utc>) -> Self {
        self.start_time = Some(time);
        self
    }

    pub fn end_time(mut self, time: DateTime<Utc>) -> Self {
        self.end_time = Some(time);
        self
    }

    pub fn memory_usage_mb(mut self, mb: u64) -> Self {
        self.memory_usage_mb = mb;
        self
    }

    pub fn temp_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_file_path = Some(path.into());
        self
    }

    pub fn executed_code(mut self, code: impl Into<String>) -> Self {
        self.executed_code = Some(code.into());
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn timed_out(mut self, timed_out: bool) -> Self {
        self.timed_out = timed_out;
        self
    }

    /// Truncate logs and error output to this many characters
    pub fn max_output_length(mut self, chars: usize) -> Self {
        self.max_output_length = Some(chars);
        self
    }

    pub fn build(self) -> ExecutionResult {
        let end_time = self.end_time.unwrap_or_else(Utc::now);
        let start_time = self.start_time.unwrap_or(end_time);

        // Classify on the full error text, before truncation
        let error_kind = if self.exit_code == 0 {
            None
        } else if self.timed_out {
            Some(ExecutionErrorKind::TimeoutError)
        } else {
            Some(classifier::classify(
                Some(self.error_output.as_str()),
                self.exit_code,
            ))
        };

        let (logs, error_output) = match self.max_output_length {
            Some(max) => (
                truncate_output(&self.logs, max),
                truncate_output(&self.error_output, max),
            ),
            None => (self.logs, self.error_output),
        };

        ExecutionResult {
            exit_code: self.exit_code,
            logs,
            error_output,
            start_time,
            end_time,
            memory_usage_mb: self.memory_usage_mb,
            temp_file_path: self.temp_file_path,
            executed_code: self.executed_code,
            image: self.image,
            metadata: self.metadata,
            timed_out: self.timed_out,
            error_kind,
        }
    }
}
