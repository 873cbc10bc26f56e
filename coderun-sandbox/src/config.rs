//! Execution configuration
//!
//! [`ExecutionConfig`] is built once (in code or from a TOML file), validated,
//! and then shared read-only with the service.

use crate::error::SandboxError;
use crate::resolver::{Arch, Platform};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default wall-clock limit for a single run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default cap on captured output, in characters
pub const DEFAULT_MAX_OUTPUT_LENGTH: usize = 10_000;

/// Default advisory memory cap
pub const DEFAULT_MAX_MEMORY_MB: u64 = 512;

/// Configuration for code execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Wall-clock timeout for one run
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Directory code is staged into and executed from
    pub working_directory: PathBuf,

    /// Python interpreter command
    pub interpreter_command: String,

    /// Explicit interpreter path, takes precedence over `interpreter_command`
    pub custom_interpreter_path: Option<String>,

    /// Architecture hint, only honored on macOS
    pub arch: Option<Arch>,

    /// Scan staged code for disallowed modules (advisory)
    pub security_mode: bool,

    pub disallowed_modules: Vec<String>,

    pub max_memory_mb: u64,

    /// Apply `max_memory_mb` as an address-space limit on Unix
    pub enforce_memory_limit: bool,

    /// Cap on `logs` and `error_output`, in characters
    pub max_output_length: usize,

    /// Merged over the inherited environment
    pub environment_variables: HashMap<String, String>,

    /// Keep staged files after execution (debugging)
    pub keep_temp_files: bool,

    pub verbose_logging: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            working_directory: default_working_directory(),
            interpreter_command: Platform::current().default_python().to_string(),
            custom_interpreter_path: None,
            arch: None,
            security_mode: true,
            disallowed_modules: vec!["os.system".to_string()],
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
            enforce_memory_limit: false,
            max_output_length: DEFAULT_MAX_OUTPUT_LENGTH,
            environment_variables: HashMap::new(),
            keep_temp_files: false,
            verbose_logging: false,
        }
    }
}

fn default_working_directory() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("extensions")
}

impl ExecutionConfig {
    /// Stricter limits for untrusted code
    pub fn secure() -> Self {
        Self {
            security_mode: true,
            max_memory_mb: 256,
            timeout: Duration::from_secs(60),
            disallowed_modules: ["os", "sys", "subprocess", "socket", "urllib"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            ..Self::default()
        }
    }

    /// Relaxed limits for local development and debugging
    pub fn development() -> Self {
        Self {
            security_mode: false,
            max_memory_mb: 1024,
            timeout: Duration::from_secs(600),
            keep_temp_files: true,
            verbose_logging: true,
            disallowed_modules: Vec::new(),
            ..Self::default()
        }
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the working directory
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = dir.into();
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment_variables.insert(key.into(), value.into());
        self
    }

    /// Set the output cap
    pub fn with_max_output_length(mut self, len: usize) -> Self {
        self.max_output_length = len;
        self
    }

    pub fn with_keep_temp_files(mut self, keep: bool) -> Self {
        self.keep_temp_files = keep;
        self
    }

    /// Reject values no execution can run with
    pub fn validate(&self) -> Result<(), SandboxError> {
        if self.timeout.is_zero() {
            return Err(SandboxError::InvalidConfig(
                "timeout must be positive".to_string(),
            ));
        }
        if self.max_memory_mb == 0 {
            return Err(SandboxError::InvalidConfig(
                "max_memory_mb must be positive".to_string(),
            ));
        }
        if self.max_output_length == 0 {
            return Err(SandboxError::InvalidConfig(
                "max_output_length must be positive".to_string(),
            ));
        }
        if self.interpreter_command.trim().is_empty() {
            return Err(SandboxError::InvalidConfig(
                "interpreter_command must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Interpreter used for Python code
    pub fn python_interpreter(&self) -> &str {
        self.custom_interpreter_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.interpreter_command)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, SandboxError> {
        let config: ExecutionConfig = toml::from_str(content)
            .map_err(|e| SandboxError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SandboxError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String, SandboxError> {
        toml::to_string_pretty(self)
            .map_err(|e| SandboxError::Config(format!("Failed to serialize config: {}", e)))
    }
}
