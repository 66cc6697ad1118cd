//! ReAct agent: step/trace model, prompts and the controller loop

pub mod prompts;
pub mod react;
pub mod text_actions;
pub mod types;

pub use react::{AgentSettings, ReActAgent};
pub use text_actions::TextAction;
pub use types::{
    AgentInput, AgentOutput, ContextMap, Metadata, Step, StopReason, TokenUsage, ToolCallRecord,
};
