//! CLI command implementations
//!
//! Each `execute_*` function returns whether the command succeeded; `main`
//! turns a failure into a non-zero exit status.

use crate::{Preset, RunOverrides};
use anyhow::{anyhow, bail, Context, Result};
use coderun_sandbox::{
    content_to_text, extract, CodeExecutionTool, ExecutionConfig, ExecutionRequest,
    ExecutionResult, Language, SandboxError, SandboxService,
};
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Install the tracing subscriber: stderr always, plus an optional log file.
///
/// The returned guard flushes the file writer and must be held until exit.
pub fn init_logging(
    verbose: bool,
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "coderun={},coderun_sandbox={}",
            log_level, log_level
        ))
    });

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow!("Invalid log file path: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    Ok(guard)
}

/// Load the configuration file, or the chosen preset when none is given
pub fn load_config(path: Option<&Path>, preset: Preset) -> Result<ExecutionConfig> {
    let config = match path {
        Some(path) => ExecutionConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => match preset {
            Preset::Default => ExecutionConfig::default(),
            Preset::Secure => ExecutionConfig::secure(),
            Preset::Development => ExecutionConfig::development(),
        },
    };
    debug!(?preset, from_file = path.is_some(), "Configuration loaded");
    Ok(config)
}

fn apply_overrides(mut config: ExecutionConfig, overrides: &RunOverrides) -> ExecutionConfig {
    if let Some(secs) = overrides.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    if let Some(dir) = &overrides.work_dir {
        config = config.with_working_directory(dir);
    }
    if overrides.keep_temp_files {
        config = config.with_keep_temp_files(true);
    }
    config
}

/// Language tag for a source file, from its extension
pub fn language_for_path(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    Language::from_tag(ext).map(|lang| lang.name().to_string())
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read stdin")?;
    Ok(buf)
}

/// Cancellation token triggered by Ctrl-C
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling execution");
            trigger.cancel();
        }
    });
    token
}

/// Execute the `run` command
pub async fn execute_run(
    config: ExecutionConfig,
    path: Option<PathBuf>,
    code: Option<String>,
    language: Option<String>,
    overrides: RunOverrides,
) -> Result<bool> {
    let (code, inferred) = match (code, path) {
        (Some(code), _) => (code, None),
        (None, Some(path)) if path.as_os_str() == "-" => (read_stdin()?, None),
        (None, Some(path)) => {
            let code = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            (code, language_for_path(&path))
        }
        (None, None) => bail!("Nothing to run: pass a file, `-` for stdin, or --code"),
    };
    let language = language
        .or(inferred)
        .ok_or_else(|| anyhow!("Cannot infer the language, pass --language"))?;

    let service = SandboxService::new(apply_overrides(config, &overrides))?;
    let result = service
        .execute_with_cancellation(ExecutionRequest::new(language, code), ctrl_c_token())
        .await?;

    print_result(&result, overrides.json)?;
    Ok(result.is_successful())
}

/// Execute the `exec` command
pub async fn execute_exec(
    config: ExecutionConfig,
    command: Vec<String>,
    overrides: RunOverrides,
) -> Result<bool> {
    let service = SandboxService::new(apply_overrides(config, &overrides))?;
    let result = service.execute_command(command).await?;
    print_result(&result, overrides.json)?;
    Ok(result.is_successful())
}

/// Execute the `extract` command
pub async fn execute_extract(
    config: ExecutionConfig,
    path: Option<PathBuf>,
    inline: bool,
    content_json: bool,
    run: bool,
) -> Result<bool> {
    let input = match path {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => read_stdin()?,
    };
    let text = if content_json {
        let value: serde_json::Value =
            serde_json::from_str(&input).context("Input is not valid JSON")?;
        content_to_text(&value)
    } else {
        input
    };

    let blocks = extract(Some(&text), inline);
    if !run {
        println!("{}", serde_json::to_string_pretty(&blocks)?);
        return Ok(true);
    }

    let service = SandboxService::new(config)?;
    let mut success = true;
    for (index, block) in blocks.iter().enumerate() {
        if Language::from_tag(&block.language).is_none() {
            info!(index, language = %block.language, "Skipping block with unknown language");
            continue;
        }
        let result = match service
            .execute(ExecutionRequest::new(&block.language, &block.code))
            .await
        {
            Ok(result) => result,
            Err(SandboxError::UnsupportedOperation(reason)) => {
                info!(
                    index,
                    language = %block.language,
                    %reason,
                    "Skipping unsupported block"
                );
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        println!("--- block {} ({}) ---", index + 1, block.language);
        print_result(&result, false)?;
        success &= result.is_successful();
    }
    Ok(success)
}

/// Execute the `tool` command
pub async fn execute_tool(config: ExecutionConfig, input: Option<String>, json: bool) -> Result<bool> {
    let input = match input {
        Some(input) => input,
        None => read_stdin()?,
    };
    let tool = CodeExecutionTool::new(Arc::new(SandboxService::new(config)?));
    let output = tool.run(&input).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", output.output);
    }
    Ok(output.success)
}

/// Execute the `schema` command
pub fn execute_schema(config: ExecutionConfig) -> Result<bool> {
    let tool = CodeExecutionTool::new(Arc::new(SandboxService::new(config)?));
    println!("{}", serde_json::to_string_pretty(&tool.definition())?);
    Ok(true)
}

fn print_result(result: &ExecutionResult, as_json: bool) -> Result<()> {
    if as_json {
        let mut value = serde_json::to_value(result)?;
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "execution_time_ms".to_string(),
                json!(result.execution_time().as_millis() as u64),
            );
            map.insert("success".to_string(), json!(result.is_successful()));
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if result.has_output() {
        println!("{}", result.logs());
    }
    if result.is_failed() {
        if result.has_error_output() && result.error_output() != result.logs() {
            eprintln!("{}", result.error_output());
        }
        if let Some(kind) = result.error_kind() {
            eprintln!(
                "✗ {} (exit code {}, {} ms)",
                kind.description(),
                result.exit_code(),
                result.execution_time().as_millis()
            );
        }
    }
    Ok(())
}
