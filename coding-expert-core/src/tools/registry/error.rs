use crate::error::{ErrorCode, ErrorInfo};
use crate::languages::LanguageError;
use crate::tools::schema::SchemaViolation;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionError {
    pub tool_name: String,
    pub error_type: ToolErrorType,
    pub message: String,
    /// The model can recover by changing its input or approach
    pub is_recoverable: bool,
    pub recovery_suggestions: Vec<String>,
    pub original_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorType {
    InvalidParameters,
    ToolNotFound,
    LanguageNotFound,
    ResourceNotFound,
    NetworkError,
    Timeout,
    RateLimited,
    Unsupported,
    Cancelled,
    ExecutionError,
}

impl ToolErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorType::InvalidParameters => "invalid_parameters",
            ToolErrorType::ToolNotFound => "tool_not_found",
            ToolErrorType::LanguageNotFound => "language_not_found",
            ToolErrorType::ResourceNotFound => "resource_not_found",
            ToolErrorType::NetworkError => "network_error",
            ToolErrorType::Timeout => "timeout",
            ToolErrorType::RateLimited => "rate_limited",
            ToolErrorType::Unsupported => "unsupported",
            ToolErrorType::Cancelled => "cancelled",
            ToolErrorType::ExecutionError => "execution_error",
        }
    }

    /// Retryable failures; everything else is permanent
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ToolErrorType::NetworkError | ToolErrorType::Timeout | ToolErrorType::RateLimited
        )
    }
}

impl ToolExecutionError {
    pub fn new(
        tool_name: impl Into<String>,
        error_type: ToolErrorType,
        message: impl Into<String>,
    ) -> Self {
        let (is_recoverable, recovery_suggestions) = generate_recovery_info(&error_type);

        Self {
            tool_name: tool_name.into(),
            error_type,
            message: message.into(),
            is_recoverable,
            recovery_suggestions,
            original_error: None,
            details: None,
        }
    }

    pub fn with_original_error(
        tool_name: impl Into<String>,
        error_type: ToolErrorType,
        message: impl Into<String>,
        original_error: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(tool_name, error_type, message);
        error.original_error = Some(original_error.into());
        error
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_input(tool_name: &str, violation: &SchemaViolation) -> Self {
        let error = Self::new(
            tool_name,
            ToolErrorType::InvalidParameters,
            format!("invalid input: {violation}"),
        );
        match &violation.property {
            Some(property) => error.with_details(json!({ "property": property })),
            None => error,
        }
    }

    pub fn not_found(tool_name: &str, available: &[String]) -> Self {
        Self::new(
            tool_name,
            ToolErrorType::ToolNotFound,
            format!("tool '{tool_name}' is not available"),
        )
        .with_details(json!({ "available_tools": available }))
    }

    pub fn from_language_error(tool_name: &str, error: &LanguageError) -> Self {
        let error_type = match error {
            LanguageError::EmptyCode | LanguageError::InvalidRequest(_) => {
                ToolErrorType::InvalidParameters
            }
            LanguageError::NotFound(_) => ToolErrorType::LanguageNotFound,
            LanguageError::ToolchainUnavailable { .. } => ToolErrorType::Unsupported,
            LanguageError::Cancelled => ToolErrorType::Cancelled,
            LanguageError::SyntaxError { .. } | LanguageError::Sandbox(_) => {
                ToolErrorType::ExecutionError
            }
        };
        Self::new(tool_name, error_type, error.to_string())
    }

    pub fn is_transient(&self) -> bool {
        self.error_type.is_transient()
    }

    pub fn code(&self) -> ErrorCode {
        match self.error_type {
            ToolErrorType::InvalidParameters => ErrorCode::InvalidToolInput,
            ToolErrorType::ToolNotFound => ErrorCode::ToolNotFound,
            ToolErrorType::LanguageNotFound => ErrorCode::LanguageNotFound,
            t if t.is_transient() => ErrorCode::ToolTransient,
            _ => ErrorCode::ToolFatal,
        }
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        let mut info = ErrorInfo::new(self.code(), self.message.clone());
        if let Some(details) = &self.details {
            info = info.with_details(details.clone());
        }
        if let Some(cause) = &self.original_error {
            info = info.with_cause(cause.clone());
        }
        info
    }

    /// Observation payload handed back to the model
    pub fn to_json_value(&self) -> Value {
        json!({
            "error": {
                "tool_name": self.tool_name,
                "code": self.code(),
                "error_type": self.error_type.as_str(),
                "message": self.message,
                "is_recoverable": self.is_recoverable,
                "recovery_suggestions": self.recovery_suggestions,
                "details": self.details,
            }
        })
    }
}

impl fmt::Display for ToolExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.tool_name, self.error_type.as_str(), self.message)
    }
}

impl std::error::Error for ToolExecutionError {}

fn generate_recovery_info(error_type: &ToolErrorType) -> (bool, Vec<String>) {
    match error_type {
        ToolErrorType::InvalidParameters => (
            true,
            vec![
                "Check parameter names and types against the tool schema".to_string(),
                "Ensure required parameters are provided".to_string(),
            ],
        ),
        ToolErrorType::ToolNotFound => (
            true,
            vec!["Use one of the tools listed in the system prompt".to_string()],
        ),
        ToolErrorType::LanguageNotFound => (
            true,
            vec!["Pick a language from the supported language list".to_string()],
        ),
        ToolErrorType::ResourceNotFound => (
            true,
            vec!["Refine the query or try a different source".to_string()],
        ),
        ToolErrorType::NetworkError | ToolErrorType::RateLimited => (
            true,
            vec!["Retry later or answer from what is already known".to_string()],
        ),
        ToolErrorType::Timeout => (
            true,
            vec!["Reduce the amount of work or lower the expected runtime".to_string()],
        ),
        ToolErrorType::Unsupported => (
            false,
            vec!["This capability is not available on this server".to_string()],
        ),
        ToolErrorType::Cancelled => (false, Vec::new()),
        ToolErrorType::ExecutionError => (
            false,
            vec!["Review error details for specific issues".to_string()],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_transience() {
        let err = ToolExecutionError::new("qa_site_search", ToolErrorType::NetworkError, "reset");
        assert!(err.is_transient());
        assert_eq!(err.code(), ErrorCode::ToolTransient);

        let err = ToolExecutionError::new("calculator", ToolErrorType::ExecutionError, "1/0");
        assert!(!err.is_transient());
        assert_eq!(err.code(), ErrorCode::ToolFatal);
    }

    #[test]
    fn json_value_is_structured() {
        let err = ToolExecutionError::not_found("compile", &["calculator".to_string()]);
        let value = err.to_json_value();
        assert_eq!(value["error"]["code"], "tool_not_found");
        assert_eq!(value["error"]["details"]["available_tools"][0], "calculator");
    }
}
