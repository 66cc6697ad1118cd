//! Stable error codes shared by the agent, the tools and the HTTP surface

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Machine-readable error kinds. The wire form is the snake_case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidInput,
    LanguageNotFound,
    ToolNotFound,
    InvalidToolInput,
    ToolTransient,
    ToolFatal,
    LlmRateLimited,
    LlmTimeout,
    LlmFatal,
    AgentTimeout,
    AgentMaxSteps,
    Internal,
    PayloadTooLarge,
    MethodNotAllowed,
    UnsupportedMediaType,
    NotFound,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "invalid_input",
            ErrorCode::LanguageNotFound => "language_not_found",
            ErrorCode::ToolNotFound => "tool_not_found",
            ErrorCode::InvalidToolInput => "invalid_tool_input",
            ErrorCode::ToolTransient => "tool_transient",
            ErrorCode::ToolFatal => "tool_fatal",
            ErrorCode::LlmRateLimited => "llm_rate_limited",
            ErrorCode::LlmTimeout => "llm_timeout",
            ErrorCode::LlmFatal => "llm_fatal",
            ErrorCode::AgentTimeout => "agent_timeout",
            ErrorCode::AgentMaxSteps => "agent_max_steps",
            ErrorCode::Internal => "internal",
            ErrorCode::PayloadTooLarge => "payload_too_large",
            ErrorCode::MethodNotAllowed => "method_not_allowed",
            ErrorCode::UnsupportedMediaType => "unsupported_media_type",
            ErrorCode::NotFound => "not_found",
        }
    }

    /// HTTP status used when this code reaches a client
    pub const fn http_status(&self) -> u16 {
        match self {
            ErrorCode::InvalidInput
            | ErrorCode::LanguageNotFound
            | ErrorCode::ToolNotFound
            | ErrorCode::InvalidToolInput => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::MethodNotAllowed => 405,
            ErrorCode::AgentTimeout => 408,
            ErrorCode::PayloadTooLarge => 413,
            ErrorCode::UnsupportedMediaType => 415,
            ErrorCode::AgentMaxSteps => 200,
            ErrorCode::LlmRateLimited | ErrorCode::LlmTimeout | ErrorCode::LlmFatal => 502,
            ErrorCode::ToolTransient | ErrorCode::ToolFatal | ErrorCode::Internal => 500,
        }
    }

    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::ToolTransient | ErrorCode::LlmRateLimited | ErrorCode::LlmTimeout
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error carried inside agent output and tool results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            cause: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Failures of the tool and language registries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),
    #[error("tool '{0}' is not registered")]
    ToolNotFound(String),
    #[error("language '{0}' is already registered")]
    DuplicateLanguage(String),
    #[error("language '{0}' is not supported")]
    LanguageNotFound(String),
}

impl RegistryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RegistryError::DuplicateTool(_) | RegistryError::DuplicateLanguage(_) => {
                ErrorCode::Internal
            }
            RegistryError::ToolNotFound(_) => ErrorCode::ToolNotFound,
            RegistryError::LanguageNotFound(_) => ErrorCode::LanguageNotFound,
        }
    }

    /// Short machine name of the failure, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::DuplicateTool(_) => "duplicate_tool",
            RegistryError::ToolNotFound(_) => "tool_not_found",
            RegistryError::DuplicateLanguage(_) => "duplicate_language",
            RegistryError::LanguageNotFound(_) => "language_not_found",
        }
    }
}

/// Failures that end a request or stop the service from starting
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("LLM provider error: {0}")]
    Llm(#[from] crate::llm::LLMError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::InvalidInput(_) => ErrorCode::InvalidInput,
            CoreError::Registry(err) => err.code(),
            CoreError::Llm(err) => err.code(),
            CoreError::Config(_) | CoreError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn codes_serialize_as_snake_case() {
        let value = serde_json::to_value(ErrorCode::LanguageNotFound).unwrap();
        assert_eq!(value, json!("language_not_found"));
        assert_eq!(ErrorCode::LlmRateLimited.as_str(), "llm_rate_limited");
    }

    #[test]
    fn status_mapping_follows_error_table() {
        assert_eq!(ErrorCode::InvalidInput.http_status(), 400);
        assert_eq!(ErrorCode::LanguageNotFound.http_status(), 400);
        assert_eq!(ErrorCode::PayloadTooLarge.http_status(), 413);
        assert_eq!(ErrorCode::AgentTimeout.http_status(), 408);
        assert_eq!(ErrorCode::LlmFatal.http_status(), 502);
        assert_eq!(ErrorCode::Internal.http_status(), 500);
    }

    #[test]
    fn core_errors_carry_codes() {
        let err = CoreError::from(RegistryError::LanguageNotFound("cobol".into()));
        assert_eq!(err.code(), ErrorCode::LanguageNotFound);
        assert_eq!(err.to_string(), "language 'cobol' is not supported");
        assert_eq!(
            CoreError::InvalidInput("query must not be empty".into()).code(),
            ErrorCode::InvalidInput
        );
    }

    #[test]
    fn error_info_omits_empty_fields() {
        let info = ErrorInfo::new(ErrorCode::ToolFatal, "sandbox violation");
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(
            value,
            json!({"code": "tool_fatal", "message": "sandbox violation"})
        );
    }
}
