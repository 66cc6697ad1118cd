use crate::config::SearchConfig;
use crate::error::RegistryError;
use crate::languages::LanguageRegistry;
use crate::rag::RagPipeline;
use crate::tools::ToolRegistry;
use crate::tools::calculator::CalculatorTool;
use crate::tools::code_analysis::CodeAnalysisTool;
use crate::tools::code_execution::CodeExecutionTool;
use crate::tools::search::{
    GitHubBackend, RagBackend, SearchBackend, SearchError, SearchTool, StackExchangeBackend,
    UnconfiguredBackend,
};
use std::sync::Arc;

/// Collaborators of the built-in tools
#[derive(Clone)]
pub struct BuiltinToolDeps {
    pub languages: LanguageRegistry,
    pub documentation: Arc<dyn SearchBackend>,
    /// `None` leaves the Q&A-site tool unregistered
    pub qa_site: Option<Arc<dyn SearchBackend>>,
    /// `None` leaves the code-host tool unregistered
    pub code_host: Option<Arc<dyn SearchBackend>>,
}

impl BuiltinToolDeps {
    /// Language tools and calculator only; documentation search reports it is unconfigured
    pub fn offline(languages: LanguageRegistry) -> Self {
        Self {
            languages,
            documentation: Arc::new(UnconfiguredBackend::new(
                "no documentation index is configured",
            )),
            qa_site: None,
            code_host: None,
        }
    }

    pub fn from_config(
        languages: LanguageRegistry,
        search: &SearchConfig,
        rag: Option<RagPipeline>,
    ) -> Result<Self, SearchError> {
        let mut deps = Self::offline(languages);
        if let Some(pipeline) = rag {
            deps.documentation = Arc::new(RagBackend::new(pipeline));
        }
        if search.enabled {
            deps.qa_site = Some(Arc::new(StackExchangeBackend::new(search)?));
            deps.code_host = Some(Arc::new(GitHubBackend::new(search)?));
        }
        Ok(deps)
    }
}

/// Register the built-in tool set in catalog order
pub fn register_builtin_tools(
    registry: &ToolRegistry,
    deps: BuiltinToolDeps,
) -> Result<(), RegistryError> {
    registry.register(Arc::new(CodeAnalysisTool::new(deps.languages.clone())))?;
    registry.register(Arc::new(CodeExecutionTool::new(deps.languages)))?;
    registry.register(Arc::new(SearchTool::documentation(deps.documentation)))?;
    if let Some(backend) = deps.qa_site {
        registry.register(Arc::new(SearchTool::qa_site(backend)))?;
    }
    if let Some(backend) = deps.code_host {
        registry.register(Arc::new(SearchTool::code_host(backend)))?;
    }
    registry.register(Arc::new(CalculatorTool))?;
    Ok(())
}
