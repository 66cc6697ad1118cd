//! Tool registry and function declarations

mod builtins;
mod declarations;
pub mod error;

pub use builtins::{BuiltinToolDeps, register_builtin_tools};
pub use declarations::{build_function_declarations, render_tool_catalog};
pub use error::{ToolErrorType, ToolExecutionError};

use crate::error::RegistryError;
use crate::llm::provider::ToolDefinition;
use crate::tools::traits::{Tool, ToolCategory};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Public description of a registered tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub input_schema: Value,
}

impl ToolInfo {
    fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            category: tool.category(),
            input_schema: tool.schema().to_json(),
        }
    }
}

type ToolMap = IndexMap<String, Arc<dyn Tool>>;

/// Name-indexed, concurrency-safe set of tools. Iteration order is registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<RwLock<ToolMap>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with `duplicate_tool` on a name collision, leaving the registry unchanged
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        let mut tools = self.tools.write();
        if tools.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        debug!(tool = %name, category = tool.category().as_str(), "registered tool");
        tools.insert(name, tool);
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> Result<Arc<dyn Tool>, RegistryError> {
        self.tools
            .write()
            .shift_remove(name)
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, RegistryError> {
        self.tools
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    pub fn list(&self) -> Vec<ToolInfo> {
        self.tools
            .read()
            .values()
            .map(|tool| ToolInfo::of(tool.as_ref()))
            .collect()
    }

    pub fn list_by_category(&self, category: ToolCategory) -> Vec<ToolInfo> {
        self.tools
            .read()
            .values()
            .filter(|tool| tool.category() == category)
            .map(|tool| ToolInfo::of(tool.as_ref()))
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.tools.read().len()
    }

    /// Point-in-time copy used for the span of one agent run
    pub fn snapshot(&self) -> ToolSnapshot {
        ToolSnapshot {
            tools: Arc::new(self.tools.read().clone()),
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

/// Immutable view of the registry taken at request start
#[derive(Clone, Default)]
pub struct ToolSnapshot {
    tools: Arc<ToolMap>,
}

impl ToolSnapshot {
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.values()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        build_function_declarations(self.iter().map(Arc::as_ref))
    }

    pub fn catalog(&self) -> String {
        render_tool_catalog(self.iter().map(Arc::as_ref))
    }
}
