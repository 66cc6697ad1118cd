/// Tool name constants to ensure consistency across the codebase
pub mod tools {
    pub const CODE_ANALYSIS: &str = "code_analysis";
    pub const CODE_EXECUTION: &str = "code_execution";
    pub const DOCUMENTATION_SEARCH: &str = "documentation_search";
    pub const QA_SITE_SEARCH: &str = "qa_site_search";
    pub const CODE_HOST_SEARCH: &str = "code_host_search";
    pub const CALCULATOR: &str = "calculator";

    /// Pseudo-action recorded on the terminal step of a run
    pub const FINAL_ANSWER: &str = "final_answer";
}

/// Message role constants
pub mod message_roles {
    pub const SYSTEM: &str = "system";
    pub const USER: &str = "user";
    pub const ASSISTANT: &str = "assistant";
    pub const TOOL: &str = "tool";
}

/// Default configuration values
pub mod defaults {
    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_BIND: &str = "0.0.0.0";
    pub const DEFAULT_REQUEST_MAX_BYTES: usize = 1024 * 1024;
    pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 90;
    pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

    pub const DEFAULT_PROVIDER: &str = "openai";
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    pub const DEFAULT_API_KEY_ENV: &str = "LLM_API_KEY";

    pub const DEFAULT_MAX_STEPS: usize = 5;
    pub const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 60;
    pub const DEFAULT_TEMPERATURE: f32 = 0.0;
    pub const DEFAULT_MAX_TOKENS: u32 = 2048;
    pub const DEFAULT_OBSERVATION_MAX_BYTES: usize = 4 * 1024;
    pub const DEFAULT_FINALIZATION_GRACE_SECS: u64 = 10;
    pub const DEFAULT_REPEAT_THRESHOLD: usize = 3;

    pub const DEFAULT_CONFIG_FILE: &str = "coding-expert.toml";
    pub const CONFIG_PATH_ENV: &str = "CODING_EXPERT_CONFIG";
}

/// Timeouts shared by the agent loop and the tools
pub mod timeouts {
    use std::time::Duration;

    /// Per-LLM-call cap; the effective deadline is the lesser of this and the request budget
    pub const LLM_CALL_CAP: Duration = Duration::from_secs(30);
    /// Declared timeout for tools that do not override it
    pub const TOOL_DEFAULT: Duration = Duration::from_secs(30);
    /// No tool call may be granted more than this
    pub const TOOL_CEILING: Duration = Duration::from_secs(60);
    /// Default execution timeout for `code_execution`
    pub const EXECUTION_DEFAULT_SECS: u64 = 30;
    /// Hard cap for execution timeouts
    pub const EXECUTION_MAX_SECS: u64 = 60;
}

/// Sandbox resource defaults
pub mod sandbox {
    pub const DEFAULT_MAX_MEMORY_BYTES: u64 = 512 * 1024 * 1024;
    pub const DEFAULT_MAX_CPU_SECS: u64 = 60;
    pub const DEFAULT_MAX_PROCESSES: u32 = 256;
    pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 64 * 1024;
    pub const DEFAULT_MAX_FILE_BYTES: u64 = 16 * 1024 * 1024;
    /// Bytes held back from the output budget for the sandbox's own notices
    pub const NOTICE_RESERVE_BYTES: usize = 256;
    pub const CACHE_DIR_NAME: &str = "coding-expert-cache";
    /// Compile phase of compiled languages
    pub const BUILD_TIMEOUT_SECS: u64 = 60;
    pub const BUILD_MAX_CPU_SECS: u64 = 120;
    pub const BUILD_MAX_PROCESSES: u32 = 1024;
    pub const BUILD_MAX_FILE_BYTES: u64 = 512 * 1024 * 1024;
}

/// Search backend endpoints
pub mod search {
    pub const STACKEXCHANGE_API: &str = "https://api.stackexchange.com/2.3";
    pub const STACKEXCHANGE_SITE: &str = "stackoverflow";
    pub const GITHUB_API: &str = "https://api.github.com";
    pub const DEFAULT_MAX_RESULTS: usize = 5;
    pub const MAX_RESULTS_CEILING: usize = 10;
    pub const USER_AGENT: &str = concat!("coding-expert/", env!("CARGO_PKG_VERSION"));
}

/// Retrieval defaults
pub mod rag {
    pub const DEFAULT_TOP_K: usize = 5;
    pub const DEFAULT_MIN_SCORE: f32 = 0.15;
    pub const DEFAULT_EMBEDDING_DIMENSION: usize = 512;
}

/// URL constants for LLM providers
pub mod urls {
    pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
    pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
}
