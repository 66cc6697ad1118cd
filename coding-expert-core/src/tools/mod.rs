//! Agent tools: the contract, the registry and the built-in tool set

pub mod calculator;
pub mod code_analysis;
pub mod code_execution;
pub mod registry;
pub mod schema;
pub mod search;
pub mod traits;

pub use registry::{
    BuiltinToolDeps, ToolErrorType, ToolExecutionError, ToolInfo, ToolRegistry, ToolSnapshot,
    register_builtin_tools,
};
pub use schema::{PropertyKind, PropertySchema, SchemaViolation, ToolSchema};
pub use traits::{Tool, ToolCategory};
