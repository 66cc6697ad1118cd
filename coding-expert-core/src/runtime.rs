//! Process-scoped wiring: sandbox, registries, retrieval index, LLM and agent

use crate::agent::{AgentSettings, ReActAgent};
use crate::config::{CodingExpertConfig, SandboxConfig};
use crate::context::RequestContext;
use crate::error::CoreError;
use crate::languages::{LanguageRegistry, Sandbox, builtin_provider};
use crate::llm::{LLMProvider, create_provider_from_config};
use crate::rag::RagPipeline;
use crate::tools::{BuiltinToolDeps, ToolRegistry, register_builtin_tools};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Singletons shared by every request. Cloning is cheap.
#[derive(Clone)]
pub struct Runtime {
    config: Arc<CodingExpertConfig>,
    languages: LanguageRegistry,
    tools: ToolRegistry,
    agent: Arc<ReActAgent>,
}

impl Runtime {
    /// Build everything from configuration, including the LLM provider
    pub async fn bootstrap(config: CodingExpertConfig) -> Result<Self, CoreError> {
        let llm = create_provider_from_config(&config.llm)?;
        Self::with_provider(config, llm).await
    }

    /// Same as [`Runtime::bootstrap`] with a caller-supplied LLM provider
    pub async fn with_provider(
        config: CodingExpertConfig,
        llm: Arc<dyn LLMProvider>,
    ) -> Result<Self, CoreError> {
        let languages = languages_from_config(&config.sandbox).await?;

        let rag = match &config.rag.documents_path {
            Some(path) => {
                let pipeline = RagPipeline::in_memory(&config.rag);
                pipeline.load_path(path).await.map_err(|err| {
                    CoreError::Config(format!(
                        "failed to index documents at {}: {err}",
                        path.display()
                    ))
                })?;
                Some(pipeline)
            }
            None => {
                warn!("rag.documents_path is not set; documentation_search is unavailable");
                None
            }
        };

        let deps = BuiltinToolDeps::from_config(languages.clone(), &config.search, rag)
            .map_err(|err| CoreError::Config(format!("search backends: {err}")))?;
        let tools = ToolRegistry::new();
        register_builtin_tools(&tools, deps)?;
        info!(tools = ?tools.names(), "tool registry ready");

        Ok(Self::from_parts(config, languages, tools, llm))
    }

    /// Assemble a runtime from prebuilt registries
    pub fn from_parts(
        config: CodingExpertConfig,
        languages: LanguageRegistry,
        tools: ToolRegistry,
        llm: Arc<dyn LLMProvider>,
    ) -> Self {
        let settings = AgentSettings::from_config(&config.agent);
        let agent = ReActAgent::new(llm, tools.clone(), settings);
        Self {
            config: Arc::new(config),
            languages,
            tools,
            agent: Arc::new(agent),
        }
    }

    pub fn config(&self) -> &CodingExpertConfig {
        &self.config
    }

    pub fn languages(&self) -> &LanguageRegistry {
        &self.languages
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn agent(&self) -> &ReActAgent {
        &self.agent
    }

    /// Budget of one agent request: the lesser of the write timeout and the agent timeout
    pub fn request_budget(&self) -> Duration {
        let write = Duration::from_secs(self.config.server.write_timeout_seconds);
        let agent = Duration::from_secs(self.config.agent.timeout_seconds);
        write.min(agent)
    }

    pub fn request_context(&self, token: CancellationToken) -> RequestContext {
        RequestContext::with_token(token, self.request_budget())
    }
}

/// Register the built-in provider of every language named in `sandbox.languages`
pub async fn languages_from_config(config: &SandboxConfig) -> Result<LanguageRegistry, CoreError> {
    let sandbox = Arc::new(Sandbox::from_config(config).await);
    let languages = LanguageRegistry::new();
    for name in &config.languages {
        let provider = builtin_provider(name, sandbox.clone()).ok_or_else(|| {
            CoreError::Config(format!("unknown language '{name}' in sandbox.languages"))
        })?;
        let language = provider.language().clone();
        languages.register(provider)?;
        info!(language = %language.name, version = %language.version, "registered language");
    }
    Ok(languages)
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("languages", &self.languages.names())
            .field("tools", &self.tools.names())
            .field("model", &self.agent.provider().model())
            .finish()
    }
}
