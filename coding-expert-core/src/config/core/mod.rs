pub mod agent;
pub mod llm;
pub mod sandbox;
pub mod search;
pub mod server;

pub use agent::AgentConfig;
pub use llm::LlmConfig;
pub use sandbox::{NetworkIsolation, SandboxConfig};
pub use search::{RagConfig, SearchConfig};
pub use server::ServerConfig;
