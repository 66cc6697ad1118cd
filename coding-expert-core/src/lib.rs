//! Coding Expert Core Library
//!
//! Domain logic of the coding-expert service: a ReAct agent loop that drives an
//! LLM through a registry of tools, per-language analysis and sandboxed execution,
//! documentation retrieval, and the shared error, retry and configuration types.
//!
//! ## Layout
//!
//! - [`agent`]: trace model, prompts and the [`agent::ReActAgent`] controller
//! - [`tools`]: the [`tools::Tool`] contract, [`tools::ToolRegistry`] and built-in tools
//! - [`languages`]: the [`languages::LanguageProvider`] contract, registry and sandbox
//! - [`llm`]: chat-completion contract and the OpenAI-compatible adapter
//! - [`rag`]: embedder, vector store and retrieval pipeline
//! - [`runtime`]: startup wiring of all of the above

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod languages;
pub mod llm;
pub mod rag;
pub mod retry;
pub mod runtime;
pub mod tools;

pub use agent::{AgentInput, AgentOutput, ReActAgent, StopReason};
pub use config::{CodingExpertConfig, ConfigManager};
pub use context::{Interrupted, RequestContext};
pub use error::{CoreError, ErrorCode, ErrorInfo};
pub use runtime::Runtime;
