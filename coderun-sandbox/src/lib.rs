//! coderun sandbox - timeout-bounded code execution
//!
//! Stages a code snippet into a working directory, resolves the interpreter
//! for its language, runs it as a supervised child process and returns a
//! classified [`ExecutionResult`].
//!
//! "Security mode" is advisory: it flags disallowed modules and caps output,
//! it is not an isolation boundary.

mod classifier;
mod config;
mod error;
mod execution;
mod extract;
mod policy;
mod resolver;
mod runtime;
mod service;
mod stager;
mod tool;
mod types;

pub use classifier::classify;
pub use config::{
    ExecutionConfig, DEFAULT_MAX_MEMORY_MB, DEFAULT_MAX_OUTPUT_LENGTH, DEFAULT_TIMEOUT,
};
pub use error::{ExecutionError, ExecutionErrorKind, SandboxError};
pub use execution::{ExecutionId, ExecutionPhase, PhaseTracker};
pub use extract::{content_to_text, extract, CodeBlock, UNKNOWN_LANGUAGE};
pub use policy::{PolicyViolation, SecurityPolicy};
pub use resolver::{resolve, Arch, CommandResolver, Language, Platform, ResolvedCommand};
pub use runtime::{ProcessRuntime, Runtime, DEFAULT_DRAIN_GRACE};
pub use service::SandboxService;
pub use stager::{fingerprint, CodeStager, StagedFile};
pub use tool::{format_result, CodeExecutionTool, ToolInput, ToolOutput, TOOL_NAME};
pub use types::{
    truncate_output, CommandSpec, ExecutionRequest, ExecutionResult, ExecutionResultBuilder,
    RawResult, ERROR_SEPARATOR, WORK_DIR_PARAM,
};

/// Re-export common error types
pub type Result<T> = anyhow::Result<T>;
