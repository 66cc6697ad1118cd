use crate::config::constants::sandbox;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the sandbox keeps submitted programs off the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkIsolation {
    /// Try `unshare` once at startup and use it when it works
    #[default]
    Auto,
    /// Always wrap executions in a fresh network namespace
    Unshare,
    /// Run without network isolation
    None,
}

/// Sandbox configuration for code execution
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SandboxConfig {
    #[serde(default)]
    pub network_isolation: NetworkIsolation,

    /// Build caches shared between runs (Go build cache and similar).
    /// Defaults to a directory under the system temp dir.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Languages to register at startup, by name
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    #[serde(default = "default_max_memory_bytes")]
    pub max_memory_bytes: u64,

    #[serde(default = "default_max_cpu_seconds")]
    pub max_cpu_seconds: u64,

    #[serde(default = "default_max_processes")]
    pub max_processes: u32,

    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            network_isolation: NetworkIsolation::default(),
            cache_dir: None,
            languages: default_languages(),
            max_memory_bytes: default_max_memory_bytes(),
            max_cpu_seconds: default_max_cpu_seconds(),
            max_processes: default_max_processes(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

impl SandboxConfig {
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(sandbox::CACHE_DIR_NAME))
    }
}

fn default_languages() -> Vec<String> {
    vec![
        "go".to_string(),
        "python".to_string(),
        "javascript".to_string(),
        "rust".to_string(),
    ]
}
fn default_max_memory_bytes() -> u64 {
    sandbox::DEFAULT_MAX_MEMORY_BYTES
}
fn default_max_cpu_seconds() -> u64 {
    sandbox::DEFAULT_MAX_CPU_SECS
}
fn default_max_processes() -> u32 {
    sandbox::DEFAULT_MAX_PROCESSES
}
fn default_max_output_bytes() -> usize {
    sandbox::DEFAULT_MAX_OUTPUT_BYTES
}
