//! Tool-call adapter over [`SandboxService`]
//!
//! Exposes Python execution as a named tool with a JSON-schema parameter
//! description, for use by agent frameworks.

use crate::service::SandboxService;
use crate::types::{ExecutionRequest, ExecutionResult, WORK_DIR_PARAM};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const TOOL_NAME: &str = "python_execute";

const TOOL_DESCRIPTION: &str = "Executes a Python code string. Only printed output is visible; \
function return values are not captured, so use print statements to see results.";

const NO_OUTPUT_NOTICE: &str = "Code executed successfully but produced no output";

/// Parameters accepted by the tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInput {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub work_dir: Option<String>,
}

impl ToolInput {
    /// Parse tool input. A JSON object is read as parameters; anything else,
    /// including malformed JSON, is taken as the code itself.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.starts_with('{') && trimmed.ends_with('}') {
            if let Ok(parsed) = serde_json::from_str::<ToolInput>(trimmed) {
                return parsed;
            }
        }
        Self {
            code: Some(input.to_string()),
            ..Default::default()
        }
    }
}

/// What the tool hands back to its caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    pub output: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,
}

impl ToolOutput {
    fn failure(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
            result: None,
        }
    }
}

/// `python_execute` tool
#[derive(Clone)]
pub struct CodeExecutionTool {
    service: Arc<SandboxService>,
}

impl CodeExecutionTool {
    pub fn new(service: Arc<SandboxService>) -> Self {
        Self { service }
    }

    pub fn name(&self) -> &str {
        TOOL_NAME
    }

    pub fn description(&self) -> &str {
        TOOL_DESCRIPTION
    }

    /// JSON schema of [`ToolInput`]
    pub fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "The Python code to execute. Only printed output is visible."
                },
                "filename": {
                    "type": "string",
                    "description": "Optional file name; generated from the code when omitted"
                },
                "work_dir": {
                    "type": "string",
                    "description": "Optional working directory"
                }
            },
            "required": ["code"]
        })
    }

    /// Name, description and parameters in one document
    pub fn definition(&self) -> Value {
        json!({
            "name": self.name(),
            "description": self.description(),
            "parameters": self.parameters(),
        })
    }

    pub async fn run(&self, input: &str) -> ToolOutput {
        let params = ToolInput::parse(input);
        let Some(code) = params.code.filter(|c| !c.trim().is_empty()) else {
            tracing::warn!(tool = TOOL_NAME, "Rejected tool call without code");
            return ToolOutput::failure("Python code must not be empty");
        };

        let mut request = ExecutionRequest::new("python", code);
        if let Some(filename) = params.filename.filter(|f| !f.trim().is_empty()) {
            request = request.with_filename(filename);
        }
        if let Some(dir) = params.work_dir.filter(|d| !d.trim().is_empty()) {
            request = request.with_param(WORK_DIR_PARAM, dir);
        }

        match self.service.execute(request).await {
            Ok(result) => {
                let success = result.is_successful();
                tracing::debug!(
                    tool = TOOL_NAME,
                    success,
                    exit_code = result.exit_code(),
                    "Tool call finished"
                );
                ToolOutput {
                    output: format_result(&result),
                    success,
                    result: Some(result),
                }
            }
            Err(e) => {
                tracing::warn!(tool = TOOL_NAME, error = %e, "Tool call failed");
                ToolOutput::failure(format!("Python code execution failed: {}", e))
            }
        }
    }
}

/// Render a result for a tool caller
pub fn format_result(result: &ExecutionResult) -> String {
    if result.is_successful() {
        let output = result.logs().trim();
        if output.is_empty() {
            return NO_OUTPUT_NOTICE.to_string();
        }
        return output.to_string();
    }

    let mut out = format!(
        "Python code execution failed (exit code: {})",
        result.exit_code()
    );
    if result.has_output() {
        out.push_str(&format!("\nOutput: {}", result.logs().trim()));
    }
    if result.has_error_output() {
        out.push_str(&format!("\nError: {}", result.error_output().trim()));
    }
    out.push_str(&format!(
        "\nExecution time: {}ms",
        result.execution_time().as_millis()
    ));
    out
}
