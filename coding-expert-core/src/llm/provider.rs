//! Chat-completion contract shared by every LLM adapter
//!
//! Message roles follow the OpenAI wire model: `system`, `user`, `assistant`, `tool`.
//! Tool responses carry the `tool_call_id` of the assistant call they answer.

use crate::context::RequestContext;
use crate::error::ErrorCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn user(content: String) -> Self {
        Self {
            role: MessageRole::User,
            content,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: String) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_with_tools(content: String, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    pub fn system(content: String) -> Self {
        Self {
            role: MessageRole::System,
            content,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn tool_response(tool_call_id: String, content: String) -> Self {
        Self {
            role: MessageRole::Tool,
            content,
            tool_calls: None,
            tool_call_id: Some(tool_call_id),
        }
    }

    /// Check role constraints before a message is sent
    pub fn validate(&self) -> Result<(), String> {
        if self.role == MessageRole::Tool && self.tool_call_id.is_none() {
            return Err("tool messages must have tool_call_id".to_string());
        }
        if let Some(tool_calls) = &self.tool_calls {
            if !self.role.can_make_tool_calls() {
                return Err(format!("Role {:?} cannot make tool calls", self.role));
            }
            if tool_calls.is_empty() {
                return Err("Tool calls array should not be empty".to_string());
            }
            for tool_call in tool_calls {
                tool_call.validate()?;
            }
        }
        Ok(())
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .is_some_and(|calls| !calls.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_openai_str(&self) -> &'static str {
        use crate::config::constants::message_roles;
        match self {
            MessageRole::System => message_roles::SYSTEM,
            MessageRole::User => message_roles::USER,
            MessageRole::Assistant => message_roles::ASSISTANT,
            MessageRole::Tool => message_roles::TOOL,
        }
    }

    pub fn can_make_tool_calls(&self) -> bool {
        matches!(self, MessageRole::Assistant)
    }
}

/// Function-catalog entry offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: String, description: String, parameters: Value) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name,
                description,
                parameters,
            },
        }
    }

    pub fn function_name(&self) -> &str {
        &self.function.name
    }
}

/// How the model may use the supplied catalog.
/// The loop lets the model decide; omitting the choice means no catalog was sent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolChoice {
    #[default]
    Auto,
}

impl ToolChoice {
    pub fn to_openai_value(&self) -> Value {
        match self {
            ToolChoice::Auto => json!("auto"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON text as produced by the model
    pub arguments: String,
}

impl ToolCall {
    pub fn function(id: String, name: String, arguments: String) -> Self {
        Self {
            id,
            call_type: "function".to_string(),
            function: FunctionCall { name, arguments },
        }
    }

    pub fn parsed_arguments(&self) -> Result<Value, serde_json::Error> {
        if self.function.arguments.trim().is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str(&self.function.arguments)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.call_type != "function" {
            return Err(format!(
                "Only 'function' type is supported, got: {}",
                self.call_type
            ));
        }
        if self.id.is_empty() {
            return Err("Tool call ID cannot be empty".to_string());
        }
        if self.function.name.is_empty() {
            return Err("Function name cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Sampling and catalog options of one chat call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub stop: Vec<String>,
    /// Function catalog; `None` means the model answers in text only
    pub tools: Option<Vec<ToolDefinition>>,
    pub tool_choice: Option<ToolChoice>,
}

impl ChatOptions {
    /// Same options with the catalog removed
    pub fn without_tools(&self) -> Self {
        Self {
            tools: None,
            tool_choice: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LLMResponse {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub usage: Option<Usage>,
    pub finish_reason: FinishReason,
}

impl LLMResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: None,
            usage: None,
            finish_reason: FinishReason::Stop,
        }
    }

    pub fn tool_call(content: Option<String>, call: ToolCall) -> Self {
        Self {
            content,
            tool_calls: Some(vec![call]),
            usage: None,
            finish_reason: FinishReason::ToolCalls,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_finish_reason(mut self, finish_reason: FinishReason) -> Self {
        self.finish_reason = finish_reason;
        self
    }

    /// First tool call, if the model requested any
    pub fn first_tool_call(&self) -> Option<&ToolCall> {
        self.tool_calls.as_ref().and_then(|calls| calls.first())
    }

    /// Trimmed text content, `None` when empty
    pub fn text_content(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    #[serde(rename = "tool_call")]
    ToolCalls,
    ContentFilter,
    Error(String),
}

impl FinishReason {
    pub fn from_openai(reason: &str) -> Self {
        match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "tool_calls" | "function_call" => FinishReason::ToolCalls,
            "content_filter" => FinishReason::ContentFilter,
            other => FinishReason::Error(other.to_string()),
        }
    }
}

/// Universal LLM provider trait
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Provider name (e.g., "openai", "openrouter")
    fn name(&self) -> &str;

    /// Model the provider sends requests to
    fn model(&self) -> &str;

    /// Whether the provider honours a function catalog
    fn supports_tools(&self) -> bool {
        true
    }

    /// One chat completion. Implementations must stop promptly when `ctx` is
    /// cancelled or its deadline passes.
    async fn chat(
        &self,
        ctx: &RequestContext,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<LLMResponse, LLMError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LLMError {
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Request cancelled")]
    Cancelled,
}

impl LLMError {
    /// Rate limits, timeouts and connection failures are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LLMError::RateLimit { .. } | LLMError::Timeout(_) | LLMError::Network(_)
        )
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            LLMError::RateLimit { .. } => ErrorCode::LlmRateLimited,
            LLMError::Timeout(_) | LLMError::Network(_) => ErrorCode::LlmTimeout,
            LLMError::Cancelled => ErrorCode::AgentTimeout,
            LLMError::Authentication(_)
            | LLMError::QuotaExceeded(_)
            | LLMError::InvalidResponse(_)
            | LLMError::InvalidRequest(_)
            | LLMError::Provider(_) => ErrorCode::LlmFatal,
        }
    }

    /// Provider-suggested wait before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LLMError::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_message_requires_call_id() {
        let mut message = Message::tool_response("call_1".to_string(), "ok".to_string());
        assert!(message.validate().is_ok());
        message.tool_call_id = None;
        assert!(message.validate().is_err());
    }

    #[test]
    fn only_assistant_may_carry_tool_calls() {
        let call = ToolCall::function("c1".into(), "calculator".into(), "{}".into());
        let mut message = Message::user("hi".to_string());
        message.tool_calls = Some(vec![call.clone()]);
        assert!(message.validate().is_err());

        let message = Message::assistant_with_tools(String::new(), vec![call]);
        assert!(message.validate().is_ok());
        assert!(message.has_tool_calls());
    }

    #[test]
    fn empty_arguments_parse_as_empty_object() {
        let call = ToolCall::function("c1".into(), "calculator".into(), "  ".into());
        assert_eq!(call.parsed_arguments().unwrap(), json!({}));
    }

    #[test]
    fn transient_classification() {
        assert!(
            LLMError::RateLimit {
                message: "slow down".into(),
                retry_after: None
            }
            .is_transient()
        );
        assert!(LLMError::Timeout("read".into()).is_transient());
        assert!(!LLMError::QuotaExceeded("billing".into()).is_transient());
        assert!(!LLMError::Authentication("bad key".into()).is_transient());
        assert_eq!(
            LLMError::InvalidResponse("garbled".into()).code(),
            ErrorCode::LlmFatal
        );
    }

    #[test]
    fn finish_reason_wire_names() {
        assert_eq!(FinishReason::from_openai("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(
            serde_json::to_value(FinishReason::ToolCalls).unwrap(),
            json!("tool_call")
        );
        assert_eq!(
            FinishReason::from_openai("weird"),
            FinishReason::Error("weird".to_string())
        );
    }
}
