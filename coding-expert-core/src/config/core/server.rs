use crate::config::constants::defaults;
use serde::{Deserialize, Serialize};

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_bind")]
    pub bind: String,

    /// Largest accepted request body, in bytes
    #[serde(default = "default_request_max_bytes")]
    pub request_max_bytes: usize,

    /// Upper bound for producing a response; caps the agent deadline
    #[serde(default = "default_write_timeout_seconds")]
    pub write_timeout_seconds: u64,

    /// Time in-flight requests get to finish after SIGINT/SIGTERM
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,

    /// Allowed CORS origins; `["*"]` permits any origin
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            request_max_bytes: default_request_max_bytes(),
            write_timeout_seconds: default_write_timeout_seconds(),
            shutdown_grace_seconds: default_shutdown_grace_seconds(),
            cors_allowed_origins: default_cors_allowed_origins(),
        }
    }
}

impl ServerConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.cors_allowed_origins.iter().any(|origin| origin == "*")
    }
}

fn default_port() -> u16 {
    defaults::DEFAULT_PORT
}
fn default_bind() -> String {
    defaults::DEFAULT_BIND.to_string()
}
fn default_request_max_bytes() -> usize {
    defaults::DEFAULT_REQUEST_MAX_BYTES
}
fn default_write_timeout_seconds() -> u64 {
    defaults::DEFAULT_WRITE_TIMEOUT_SECS
}
fn default_shutdown_grace_seconds() -> u64 {
    defaults::DEFAULT_SHUTDOWN_GRACE_SECS
}
fn default_cors_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}
