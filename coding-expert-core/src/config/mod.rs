//! Configuration for the coding-expert service
//!
//! Values are layered: built-in defaults, an optional TOML file, the process
//! environment (including `.env`), then command-line flags applied by the binary.

pub mod constants;
pub mod core;
pub mod loader;

pub use core::{
    AgentConfig, LlmConfig, NetworkIsolation, RagConfig, SandboxConfig, SearchConfig, ServerConfig,
};
pub use loader::{CodingExpertConfig, ConfigManager};
