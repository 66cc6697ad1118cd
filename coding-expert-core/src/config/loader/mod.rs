use crate::config::constants::defaults;
use crate::config::core::{
    AgentConfig, LlmConfig, RagConfig, SandboxConfig, SearchConfig, ServerConfig,
};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main configuration structure for the coding-expert service
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CodingExpertConfig {
    /// HTTP surface settings
    #[serde(default)]
    pub server: ServerConfig,

    /// ReAct loop budgets and behaviour
    #[serde(default)]
    pub agent: AgentConfig,

    /// LLM provider selection and credentials
    #[serde(default)]
    pub llm: LlmConfig,

    /// Code execution sandbox
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Q&A-site and code-host search backends
    #[serde(default)]
    pub search: SearchConfig,

    /// Documentation retrieval
    #[serde(default)]
    pub rag: RagConfig,
}

/// Loads, layers and validates [`CodingExpertConfig`]
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: CodingExpertConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from the default locations and the process environment.
    ///
    /// File resolution order: `explicit`, then `CODING_EXPERT_CONFIG`, then
    /// `coding-expert.toml` in the working directory if it exists. A `.env` file is
    /// read before the environment is consulted.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut manager = match Self::resolve_path(explicit) {
            Some(path) => Self::load_from_file(path)?,
            None => Self::from_config(CodingExpertConfig::default()),
        };
        manager.apply_env()?;
        Ok(manager)
    }

    fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(defaults::CONFIG_PATH_ENV) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        let fallback = PathBuf::from(defaults::DEFAULT_CONFIG_FILE);
        fallback.exists().then_some(fallback)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: CodingExpertConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(Self {
            config,
            config_path: Some(path.to_path_buf()),
        })
    }

    pub fn from_config(config: CodingExpertConfig) -> Self {
        Self {
            config,
            config_path: None,
        }
    }

    /// Overlay the process environment onto the loaded configuration
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay variables from `lookup`. Empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let config = &mut self.config;

        if let Some(port) = get("PORT") {
            config.server.port = parse_env("PORT", &port)?;
        }
        if let Some(bytes) = get("REQUEST_MAX_BYTES") {
            config.server.request_max_bytes = parse_env("REQUEST_MAX_BYTES", &bytes)?;
        }
        if let Some(steps) = get("AGENT_MAX_STEPS") {
            config.agent.max_steps = parse_env("AGENT_MAX_STEPS", &steps)?;
        }
        if let Some(secs) = get("AGENT_TIMEOUT_SECONDS") {
            config.agent.timeout_seconds = parse_env("AGENT_TIMEOUT_SECONDS", &secs)?;
        }
        if let Some(verbose) = get("AGENT_VERBOSE") {
            config.agent.verbose = parse_flag(&verbose);
        }
        if let Some(key) = get(defaults::DEFAULT_API_KEY_ENV) {
            config.llm.api_key = Some(key);
        }
        if let Some(model) = get("LLM_MODEL") {
            config.llm.model = model;
        }
        if let Some(url) = get("LLM_BASE_URL") {
            config.llm.base_url = Some(url);
        }
        if let Some(provider) = get("LLM_PROVIDER") {
            config.llm.provider = provider.to_lowercase();
        }
        if let Some(token) = get("GITHUB_TOKEN") {
            config.search.github_token = Some(token);
        }
        Ok(())
    }

    /// Reject configurations the service cannot start with
    pub fn validate(&self) -> Result<()> {
        let config = &self.config;
        if config.agent.max_steps == 0 {
            bail!("agent.max_steps must be greater than zero");
        }
        if config.agent.timeout_seconds == 0 {
            bail!("agent.timeout_seconds must be greater than zero");
        }
        if config.agent.llm_call_timeout_seconds == 0 {
            bail!("agent.llm_call_timeout_seconds must be greater than zero");
        }
        if config.agent.observation_max_bytes == 0 {
            bail!("agent.observation_max_bytes must be greater than zero");
        }
        if config.server.request_max_bytes == 0 {
            bail!("server.request_max_bytes must be greater than zero");
        }
        if !(0.0..=2.0).contains(&config.agent.temperature) {
            bail!(
                "agent.temperature must be within 0.0..=2.0, got {}",
                config.agent.temperature
            );
        }
        if config.sandbox.max_output_bytes == 0 {
            bail!("sandbox.max_output_bytes must be greater than zero");
        }
        let has_key = config
            .llm
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if !has_key {
            bail!(
                "{} is not set; an LLM API key is required to start",
                defaults::DEFAULT_API_KEY_ENV
            );
        }
        Ok(())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &CodingExpertConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut CodingExpertConfig {
        &mut self.config
    }

    pub fn into_config(self) -> CodingExpertConfig {
        self.config
    }

    /// Get the configuration file path (if loaded from file)
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|err| anyhow::anyhow!("invalid value for {key}: {value:?} ({err})"))
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
