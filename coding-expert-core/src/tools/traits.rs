//! Core traits for the tool system

use crate::config::constants::timeouts;
use crate::context::RequestContext;
use crate::tools::registry::error::ToolExecutionError;
use crate::tools::schema::ToolSchema;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Grouping used by `list_by_category`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Analysis,
    Execution,
    Search,
    Utility,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::Analysis => "analysis",
            ToolCategory::Execution => "execution",
            ToolCategory::Search => "search",
            ToolCategory::Utility => "utility",
        }
    }
}

/// Core trait for all agent tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's name
    fn name(&self) -> &'static str;

    /// Get the tool's description
    fn description(&self) -> &'static str;

    /// Input schema offered to the model
    fn schema(&self) -> ToolSchema;

    fn category(&self) -> ToolCategory;

    /// Longest a single call may take; the loop clamps this to the global ceiling
    fn timeout(&self) -> Duration {
        timeouts::TOOL_DEFAULT
    }

    /// Validate arguments before execution
    fn validate(&self, input: &Value) -> Result<(), ToolExecutionError> {
        self.schema()
            .validate(input)
            .map_err(|violation| ToolExecutionError::invalid_input(self.name(), &violation))
    }

    /// Execute the tool with validated arguments. Implementations must return
    /// promptly once `ctx` is cancelled.
    async fn execute(
        &self,
        ctx: &RequestContext,
        input: Value,
    ) -> Result<Value, ToolExecutionError>;
}
