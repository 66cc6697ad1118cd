use crate::config::constants::{rag, search};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// External search backends used by the search tools
#[derive(Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Enable the Q&A-site and code-host tools
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_stackexchange_url")]
    pub stackexchange_url: String,

    #[serde(default = "default_stackexchange_site")]
    pub stackexchange_site: String,

    #[serde(default = "default_github_url")]
    pub github_url: String,

    /// Token for code search; without it the code-host tool searches repositories only
    #[serde(default, skip_serializing)]
    pub github_token: Option<String>,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stackexchange_url: default_stackexchange_url(),
            stackexchange_site: default_stackexchange_site(),
            github_url: default_github_url(),
            github_token: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("enabled", &self.enabled)
            .field("stackexchange_url", &self.stackexchange_url)
            .field("stackexchange_site", &self.stackexchange_site)
            .field("github_url", &self.github_url)
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Documentation index backing `documentation_search`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RagConfig {
    /// Directory of markdown/text documents indexed at startup
    #[serde(default)]
    pub documents_path: Option<PathBuf>,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_min_score")]
    pub min_score: f32,

    #[serde(default = "default_dimension")]
    pub embedding_dimension: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            documents_path: None,
            top_k: default_top_k(),
            min_score: default_min_score(),
            embedding_dimension: default_dimension(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_stackexchange_url() -> String {
    search::STACKEXCHANGE_API.to_string()
}
fn default_stackexchange_site() -> String {
    search::STACKEXCHANGE_SITE.to_string()
}
fn default_github_url() -> String {
    search::GITHUB_API.to_string()
}
fn default_timeout_seconds() -> u64 {
    15
}
fn default_top_k() -> usize {
    rag::DEFAULT_TOP_K
}
fn default_min_score() -> f32 {
    rag::DEFAULT_MIN_SCORE
}
fn default_dimension() -> usize {
    rag::DEFAULT_EMBEDDING_DIMENSION
}
