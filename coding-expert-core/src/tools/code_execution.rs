use crate::config::constants::{timeouts, tools};
use crate::context::RequestContext;
use crate::languages::{ExecutionRequest, LanguageRegistry};
use crate::tools::code_analysis::{language_not_found, string_arg};
use crate::tools::registry::error::{ToolErrorType, ToolExecutionError};
use crate::tools::schema::{PropertySchema, ToolSchema};
use crate::tools::traits::{Tool, ToolCategory};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Runs code in the sandbox of the matching language provider
pub struct CodeExecutionTool {
    languages: LanguageRegistry,
}

impl CodeExecutionTool {
    pub fn new(languages: LanguageRegistry) -> Self {
        Self { languages }
    }
}

/// Requested timeout, defaulting when absent and clamped to the ceiling
pub fn resolve_timeout(requested: Option<u64>) -> u64 {
    requested
        .unwrap_or(timeouts::EXECUTION_DEFAULT_SECS)
        .min(timeouts::EXECUTION_MAX_SECS)
}

#[async_trait]
impl Tool for CodeExecutionTool {
    fn name(&self) -> &'static str {
        tools::CODE_EXECUTION
    }

    fn description(&self) -> &'static str {
        "Compile (if needed) and run a program in an isolated sandbox without network \
         access. Returns stdout, stderr, exit_code and duration_ms. Snippets without a \
         main function are wrapped automatically for Go and Rust."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required(
                "language",
                PropertySchema::string("Source language, e.g. go, python, javascript, rust")
                    .non_empty(),
            )
            .required("code", PropertySchema::string("Program source").non_empty())
            .optional("stdin", PropertySchema::string("Text supplied on standard input"))
            .optional(
                "timeout",
                PropertySchema::integer("Run-time limit in seconds (default 30)")
                    .range(1.0, timeouts::EXECUTION_MAX_SECS as f64),
            )
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Execution
    }

    fn timeout(&self) -> Duration {
        timeouts::TOOL_CEILING
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        input: Value,
    ) -> Result<Value, ToolExecutionError> {
        let language = string_arg(&input, "language");
        let provider = self
            .languages
            .get(language)
            .map_err(|_| language_not_found(self.name(), language, &self.languages))?;

        let request = ExecutionRequest {
            code: string_arg(&input, "code").to_string(),
            language: provider.language().name.clone(),
            stdin: input.get("stdin").and_then(Value::as_str).map(str::to_string),
            timeout_seconds: resolve_timeout(input.get("timeout").and_then(Value::as_u64)),
            allow_network: false,
        };
        debug!(language = %request.language, timeout = request.timeout_seconds, "executing code");

        let result = provider
            .execute(ctx, &request)
            .await
            .map_err(|err| ToolExecutionError::from_language_error(self.name(), &err))?;

        serde_json::to_value(&result).map_err(|err| {
            ToolExecutionError::with_original_error(
                self.name(),
                ToolErrorType::ExecutionError,
                "failed to serialize execution result",
                err.to_string(),
            )
        })
    }
}
