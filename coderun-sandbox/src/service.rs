//! Sandbox service - main entry point

use crate::config::ExecutionConfig;
use crate::error::SandboxError;
use crate::execution::ExecutionId;
use crate::policy::SecurityPolicy;
use crate::resolver::{CommandResolver, ResolvedCommand};
use crate::runtime::{ProcessRuntime, Runtime};
use crate::stager::CodeStager;
use crate::types::{
    CommandSpec, ExecutionRequest, ExecutionResult, ExecutionResultBuilder, RawResult,
};
use chrono::Utc;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Lower bound on bytes retained per output stream
const MIN_CAPTURE_BYTES: usize = 1024 * 1024;

/// Stages, runs and classifies code according to one [`ExecutionConfig`]
pub struct SandboxService {
    config: Arc<ExecutionConfig>,
    resolver: CommandResolver,
    stager: CodeStager,
    policy: SecurityPolicy,
    runtime: Arc<dyn Runtime>,
}

impl std::fmt::Debug for SandboxService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxService")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("stager", &self.stager)
            .field("policy", &self.policy)
            .field("runtime", &self.runtime.name())
            .finish()
    }
}

impl SandboxService {
    /// Create a service backed by [`ProcessRuntime`]
    pub fn new(config: ExecutionConfig) -> Result<Self, SandboxError> {
        Self::with_runtime(config, ProcessRuntime::new())
    }

    /// Create a service with a custom runtime
    pub fn with_runtime(
        config: ExecutionConfig,
        runtime: impl Runtime + 'static,
    ) -> Result<Self, SandboxError> {
        config.validate()?;

        let mut resolver = CommandResolver::host();
        if let Some(arch) = config.arch {
            resolver = CommandResolver::new(resolver.platform(), Some(arch));
        }
        let resolver = resolver.with_python(config.python_interpreter());

        Ok(Self {
            policy: SecurityPolicy::from_config(&config),
            config: Arc::new(config),
            resolver,
            stager: CodeStager::new(),
            runtime: Arc::new(runtime),
        })
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Get the runtime name
    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    /// Execute a request to completion
    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult, SandboxError> {
        self.execute_inner(request, None).await
    }

    /// Execute a request that can be cancelled through `cancel`
    pub async fn execute_with_cancellation(
        &self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, SandboxError> {
        self.execute_inner(request, Some(cancel)).await
    }

    async fn execute_inner(
        &self,
        request: ExecutionRequest,
        cancel: Option<CancellationToken>,
    ) -> Result<ExecutionResult, SandboxError> {
        let id = ExecutionId::new();
        let start_time = Utc::now();

        request.validate()?;
        let resolved = self.resolver.resolve(&request.language)?;
        let work_dir = absolute(request.effective_work_dir(&self.config.working_directory));

        tracing::info!(
            execution_id = %id,
            runtime = self.runtime.name(),
            language = %resolved.language,
            code_len = request.code.as_ref().map_or(0, |c| c.len()),
            "Executing code"
        );

        let warnings = request
            .code
            .as_deref()
            .map(|code| self.policy.scan(resolved.language, code))
            .unwrap_or_default();
        for warning in &warnings {
            tracing::warn!(
                execution_id = %id,
                module = %warning.module,
                line = warning.line,
                "Code references a disallowed module"
            );
        }

        let staged = self
            .stager
            .stage(
                &id.to_string(),
                request.code.as_deref(),
                request.filename.as_deref(),
                &work_dir,
                &resolved.extension,
            )
            .await?;

        let tokens = ResolvedCommand::command_for(
            resolved.select_available(),
            &staged.path.to_string_lossy(),
        );
        let spec = self.command_spec(tokens, Some(work_dir), cancel);

        if self.config.verbose_logging {
            if let Some(code) = &request.code {
                tracing::info!(execution_id = %id, code = %code, "Staged code");
            }
            tracing::info!(execution_id = %id, command = %spec.display(), "Resolved command");
        }
        let command = spec.display();

        let outcome = self.runtime.run(spec).await;
        self.stager
            .release(&staged, self.config.keep_temp_files)
            .await;
        let raw = outcome?;

        let mut builder = self
            .result_builder(&raw)
            .start_time(start_time)
            .temp_file_path(staged.path.clone())
            .metadata("execution_id", id.to_string())
            .metadata("language", resolved.language.name())
            .metadata("command", command);
        if let Some(code) = request.code {
            builder = builder.executed_code(code);
        }
        if !warnings.is_empty() {
            builder = builder.metadata("security_warnings", json!(warnings));
        }
        let result = builder.end_time(Utc::now()).build();

        self.log_completion(id, &result);
        Ok(result)
    }

    /// Run a command line directly in the current directory, without staging
    pub async fn execute_command<I, S>(&self, tokens: I) -> Result<ExecutionResult, SandboxError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = ExecutionId::new();
        let start_time = Utc::now();

        let spec = self.command_spec(tokens.into_iter().map(Into::into).collect(), None, None);
        let command = spec.display();
        tracing::info!(
            execution_id = %id,
            runtime = self.runtime.name(),
            command = %command,
            "Executing command"
        );

        let raw = self.runtime.run(spec).await?;
        let result = self
            .result_builder(&raw)
            .start_time(start_time)
            .metadata("execution_id", id.to_string())
            .metadata("command", command)
            .end_time(Utc::now())
            .build();

        self.log_completion(id, &result);
        Ok(result)
    }

    fn command_spec(
        &self,
        tokens: Vec<String>,
        work_dir: Option<PathBuf>,
        cancel: Option<CancellationToken>,
    ) -> CommandSpec {
        let mut spec = CommandSpec::new(tokens, self.config.timeout)
            .with_envs(&self.config.environment_variables)
            .with_capture_limit(
                self.config
                    .max_output_length
                    .saturating_mul(4)
                    .max(MIN_CAPTURE_BYTES),
            );
        if let Some(dir) = work_dir {
            spec = spec.with_work_dir(dir);
        }
        if self.config.enforce_memory_limit {
            spec = spec.with_memory_limit_mb(self.config.max_memory_mb);
        }
        if let Some(token) = cancel {
            spec = spec.with_cancellation(token);
        }
        spec
    }

    fn result_builder(&self, raw: &RawResult) -> ExecutionResultBuilder {
        ExecutionResult::builder()
            .exit_code(raw.exit_code)
            .logs(select_logs(raw))
            .error_output(raw.stderr.clone())
            .timed_out(raw.timed_out)
            .max_output_length(self.config.max_output_length)
            .metadata("timed_out", raw.timed_out)
            .metadata("phase", raw.phase.as_str())
    }

    fn log_completion(&self, id: ExecutionId, result: &ExecutionResult) {
        let elapsed_ms = result.execution_time().as_millis() as u64;
        match result.error_kind() {
            None => tracing::info!(
                execution_id = %id,
                exit_code = result.exit_code(),
                elapsed_ms,
                "Execution succeeded"
            ),
            Some(kind) => tracing::warn!(
                execution_id = %id,
                exit_code = result.exit_code(),
                error_kind = %kind,
                timed_out = result.timed_out(),
                elapsed_ms,
                "Execution failed"
            ),
        }
    }
}

/// Stdout on success; on failure stderr, or stdout when stderr is empty
fn select_logs(raw: &RawResult) -> String {
    if raw.success() || raw.stderr.is_empty() {
        raw.stdout.clone()
    } else {
        raw.stderr.clone()
    }
}

fn absolute(dir: PathBuf) -> PathBuf {
    if dir.is_absolute() {
        return dir;
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(&dir))
        .unwrap_or(dir)
}
