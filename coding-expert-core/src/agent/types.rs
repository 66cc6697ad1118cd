//! Trace model of one agent run

use crate::config::constants::tools;
use crate::error::{ErrorCode, ErrorInfo};
use crate::llm::Usage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form request context, rendered into the first user message
pub type ContextMap = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInput {
    pub query: String,
    #[serde(default)]
    pub context: ContextMap,
}

impl AgentInput {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context: ContextMap::new(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// One Reason/Act/Observe iteration.
///
/// `action` names whatever the model asked for, including unknown tools and calls whose
/// input failed schema validation. Those steps carry the error as their observation but
/// no `tool_call_id`: only dispatched calls get a [`ToolCallRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub step_number: usize,
    pub thought: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_input: Option<Value>,
    pub observation: String,
    /// Set when the step executed a tool; matches `ToolCallRecord::id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Step {
    pub fn is_terminal(&self) -> bool {
        self.action.as_deref() == Some(tools::FINAL_ANSWER)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub tool_name: String,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub duration_ms: u64,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn add(&mut self, usage: &Usage) {
        self.prompt += u64::from(usage.prompt_tokens);
        self.completion += u64::from(usage.completion_tokens);
        self.total += u64::from(usage.total_tokens);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Answered,
    MaxSteps,
    Timeout,
    LlmError,
    ToolError,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Answered => "answered",
            StopReason::MaxSteps => "max_steps",
            StopReason::Timeout => "timeout",
            StopReason::LlmError => "llm_error",
            StopReason::ToolError => "tool_error",
        }
    }

    /// Error code associated with a non-answered run
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            StopReason::Answered => None,
            StopReason::MaxSteps => Some(ErrorCode::AgentMaxSteps),
            StopReason::Timeout => Some(ErrorCode::AgentTimeout),
            StopReason::LlmError => Some(ErrorCode::LlmFatal),
            StopReason::ToolError => Some(ErrorCode::ToolFatal),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub duration_ms: u64,
    pub tokens_used: TokenUsage,
    pub stop_reason: StopReason,
    pub llm_calls: u32,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub output: String,
    pub steps: Vec<Step>,
    /// Validated dispatches only, in step order
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub metadata: Metadata,
}

impl AgentOutput {
    pub fn stop_reason(&self) -> StopReason {
        self.metadata.stop_reason
    }

    pub fn was_answered(&self) -> bool {
        self.metadata.stop_reason == StopReason::Answered
    }

    pub fn step(&self, action: &str) -> Option<&Step> {
        self.steps
            .iter()
            .find(|step| step.action.as_deref() == Some(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stop_reason_wire_names() {
        assert_eq!(
            serde_json::to_value(StopReason::MaxSteps).unwrap(),
            json!("max_steps")
        );
        assert_eq!(StopReason::LlmError.as_str(), "llm_error");
        assert_eq!(StopReason::Timeout.code(), Some(ErrorCode::AgentTimeout));
        assert_eq!(StopReason::Answered.code(), None);
    }

    #[test]
    fn terminal_step_omits_empty_fields() {
        let step = Step {
            step_number: 1,
            thought: String::new(),
            action: Some(tools::FINAL_ANSWER.to_string()),
            action_input: None,
            observation: String::new(),
            tool_call_id: None,
        };
        assert!(step.is_terminal());
        assert_eq!(
            serde_json::to_value(&step).unwrap(),
            json!({"step_number": 1, "thought": "", "action": "final_answer", "observation": ""})
        );
    }

    #[test]
    fn input_context_defaults_to_empty() {
        let input: AgentInput = serde_json::from_value(json!({"query": "why?"})).unwrap();
        assert!(input.context.is_empty());
        let input = AgentInput::new("q").with_context("language", "go");
        assert_eq!(input.context["language"], "go");
    }

    #[test]
    fn usage_accumulates() {
        let mut total = TokenUsage::default();
        let usage = Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        total.add(&usage);
        total.add(&usage);
        assert_eq!(total.total, 30);
        assert_eq!(total.prompt, 20);
    }
}
