use crate::config::constants::{defaults, timeouts};
use serde::{Deserialize, Serialize};

/// Agent-wide configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    /// Maximum number of ReAct steps per request
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Wall-clock budget of a single agent run, in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Sampling temperature; 0 makes runs reproducible with deterministic tools
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token cap per LLM call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Byte budget of one observation fed back to the model
    #[serde(default = "default_observation_max_bytes")]
    pub observation_max_bytes: usize,

    /// Emit one info-level record per step instead of debug-level
    #[serde(default)]
    pub verbose: bool,

    /// Offer the tool catalog through native function calling.
    /// When disabled the model must follow the textual action grammar.
    #[serde(default = "default_function_calling")]
    pub function_calling: bool,

    /// Extra time granted to the summarising call after the step or time budget runs out
    #[serde(default = "default_finalization_grace_seconds")]
    pub finalization_grace_seconds: u64,

    /// Cap on a single LLM call; the effective deadline is the lesser of this and the
    /// remaining budget
    #[serde(default = "default_llm_call_timeout_seconds")]
    pub llm_call_timeout_seconds: u64,

    /// Identical consecutive actions tolerated before the loop nudges the model
    #[serde(default = "default_repeat_threshold")]
    pub repeat_threshold: usize,

    /// Retries for transient LLM failures (rate limits, timeouts)
    #[serde(default = "default_llm_max_retries")]
    pub llm_max_retries: u32,

    /// Retries for transient tool failures
    #[serde(default = "default_tool_max_retries")]
    pub tool_max_retries: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            timeout_seconds: default_timeout_seconds(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            observation_max_bytes: default_observation_max_bytes(),
            verbose: false,
            function_calling: default_function_calling(),
            finalization_grace_seconds: default_finalization_grace_seconds(),
            llm_call_timeout_seconds: default_llm_call_timeout_seconds(),
            repeat_threshold: default_repeat_threshold(),
            llm_max_retries: default_llm_max_retries(),
            tool_max_retries: default_tool_max_retries(),
        }
    }
}

fn default_max_steps() -> usize {
    defaults::DEFAULT_MAX_STEPS
}
fn default_timeout_seconds() -> u64 {
    defaults::DEFAULT_AGENT_TIMEOUT_SECS
}
fn default_temperature() -> f32 {
    defaults::DEFAULT_TEMPERATURE
}
fn default_max_tokens() -> u32 {
    defaults::DEFAULT_MAX_TOKENS
}
fn default_observation_max_bytes() -> usize {
    defaults::DEFAULT_OBSERVATION_MAX_BYTES
}
fn default_function_calling() -> bool {
    true
}
fn default_finalization_grace_seconds() -> u64 {
    defaults::DEFAULT_FINALIZATION_GRACE_SECS
}
fn default_llm_call_timeout_seconds() -> u64 {
    timeouts::LLM_CALL_CAP.as_secs()
}
fn default_repeat_threshold() -> usize {
    defaults::DEFAULT_REPEAT_THRESHOLD
}
fn default_llm_max_retries() -> u32 {
    3
}
fn default_tool_max_retries() -> u32 {
    2
}
