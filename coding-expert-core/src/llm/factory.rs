use super::providers::OpenAIProvider;
use crate::config::LlmConfig;
use crate::config::constants::urls;
use crate::llm::provider::{LLMError, LLMProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

type ProviderConstructor =
    Box<dyn Fn(ProviderConfig) -> Result<Arc<dyn LLMProvider>, LLMError> + Send + Sync>;

/// LLM provider factory and registry
pub struct LLMFactory {
    providers: HashMap<String, ProviderConstructor>,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl From<&LlmConfig> for ProviderConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
            connect_timeout: Duration::from_secs(config.connect_timeout_seconds),
        }
    }
}

impl LLMFactory {
    pub fn new() -> Self {
        let mut factory = Self {
            providers: HashMap::new(),
        };

        factory.register_provider("openai", |config| {
            openai_compatible("openai", config, urls::OPENAI_API_BASE)
        });
        factory.register_provider("openrouter", |config| {
            openai_compatible("openrouter", config, urls::OPENROUTER_API_BASE)
        });
        // Self-hosted gateways speaking the same protocol; base_url is mandatory
        factory.register_provider("compatible", |config| {
            if config.base_url.is_none() {
                return Err(LLMError::InvalidRequest(
                    "provider 'compatible' requires llm.base_url".to_string(),
                ));
            }
            openai_compatible("compatible", config, urls::OPENAI_API_BASE)
        });

        factory
    }

    /// Register a new provider
    pub fn register_provider<F>(&mut self, name: &str, factory_fn: F)
    where
        F: Fn(ProviderConfig) -> Result<Arc<dyn LLMProvider>, LLMError> + Send + Sync + 'static,
    {
        self.providers
            .insert(name.to_lowercase(), Box::new(factory_fn));
    }

    /// Create provider instance
    pub fn create_provider(
        &self,
        provider_name: &str,
        config: ProviderConfig,
    ) -> Result<Arc<dyn LLMProvider>, LLMError> {
        let factory_fn = self
            .providers
            .get(&provider_name.to_lowercase())
            .ok_or_else(|| LLMError::InvalidRequest(format!("Unknown provider: {provider_name}")))?;

        factory_fn(config)
    }

    /// List available providers
    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for LLMFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn openai_compatible(
    name: &str,
    config: ProviderConfig,
    default_base: &str,
) -> Result<Arc<dyn LLMProvider>, LLMError> {
    let api_key = config
        .api_key
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| LLMError::Authentication(format!("no API key configured for {name}")))?;

    let http_client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|e| LLMError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;

    let base_url = config
        .base_url
        .unwrap_or_else(|| default_base.to_string());

    Ok(Arc::new(OpenAIProvider::with_base_url(
        name,
        api_key,
        config.model,
        base_url,
        http_client,
    )))
}

/// Create the provider named in `config.provider`
pub fn create_provider_from_config(config: &LlmConfig) -> Result<Arc<dyn LLMProvider>, LLMError> {
    LLMFactory::new().create_provider(&config.provider, ProviderConfig::from(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            api_key: api_key.map(str::to_string),
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn builds_known_providers() {
        let factory = LLMFactory::new();
        assert_eq!(
            factory.list_providers(),
            vec!["compatible", "openai", "openrouter"]
        );
        let provider = factory.create_provider("OpenAI", config(Some("sk"))).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "gpt-4o-mini");
    }

    #[test]
    fn unknown_provider_and_missing_key_fail() {
        let factory = LLMFactory::new();
        assert!(matches!(
            factory.create_provider("nope", config(Some("sk"))),
            Err(LLMError::InvalidRequest(_))
        ));
        assert!(matches!(
            factory.create_provider("openai", config(None)),
            Err(LLMError::Authentication(_))
        ));
        assert!(factory.create_provider("compatible", config(Some("sk"))).is_err());
    }
}
