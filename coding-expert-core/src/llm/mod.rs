//! LLM provider contract and adapters

pub mod factory;
pub mod provider;
pub mod providers;

pub use factory::{LLMFactory, ProviderConfig, create_provider_from_config};
pub use provider::{
    ChatOptions, FinishReason, FunctionCall, FunctionDefinition, LLMError, LLMProvider,
    LLMResponse, Message, MessageRole, ToolCall, ToolChoice, ToolDefinition, Usage,
};
pub use providers::{OpenAIProvider, ScriptedProvider};
