use crate::config::constants::tools;
use crate::context::RequestContext;
use crate::languages::LanguageRegistry;
use crate::tools::registry::error::{ToolErrorType, ToolExecutionError};
use crate::tools::schema::{PropertySchema, ToolSchema};
use crate::tools::traits::{Tool, ToolCategory};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;

/// Static analysis through the language registry; never runs the code
pub struct CodeAnalysisTool {
    languages: LanguageRegistry,
}

impl CodeAnalysisTool {
    pub fn new(languages: LanguageRegistry) -> Self {
        Self { languages }
    }
}

pub(crate) fn language_not_found(
    tool: &str,
    language: &str,
    languages: &LanguageRegistry,
) -> ToolExecutionError {
    ToolExecutionError::new(
        tool,
        ToolErrorType::LanguageNotFound,
        format!("language '{language}' is not supported"),
    )
    .with_details(json!({ "supported_languages": languages.names() }))
}

pub(crate) fn string_arg<'a>(input: &'a Value, key: &str) -> &'a str {
    input.get(key).and_then(Value::as_str).unwrap_or_default()
}

#[async_trait]
impl Tool for CodeAnalysisTool {
    fn name(&self) -> &'static str {
        tools::CODE_ANALYSIS
    }

    fn description(&self) -> &'static str {
        "Statically analyze source code without running it. Reports syntax errors with \
         line/column, lint findings, declared functions, imports and whether the code has \
         an entry point."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required(
                "language",
                PropertySchema::string("Source language, e.g. go, python, javascript, rust")
                    .non_empty(),
            )
            .required("code", PropertySchema::string("Complete source code").non_empty())
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Analysis
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        input: Value,
    ) -> Result<Value, ToolExecutionError> {
        let language = string_arg(&input, "language");
        let code = string_arg(&input, "code");
        let provider = self
            .languages
            .get(language)
            .map_err(|_| language_not_found(self.name(), language, &self.languages))?;

        let analysis = provider
            .analyze(ctx, code)
            .await
            .map_err(|err| ToolExecutionError::from_language_error(self.name(), &err))?;

        serde_json::to_value(&analysis).map_err(|err| {
            ToolExecutionError::with_original_error(
                self.name(),
                ToolErrorType::ExecutionError,
                "failed to serialize analysis",
                err.to_string(),
            )
        })
    }
}
