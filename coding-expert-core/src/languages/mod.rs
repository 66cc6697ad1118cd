//! Language providers: per-language static analysis and sandboxed execution

pub mod analysis;
pub mod go;
pub mod javascript;
pub mod python;
pub mod registry;
pub mod rust;
pub mod sandbox;

pub use analysis::SyntaxProfile;
pub use registry::LanguageRegistry;
pub use sandbox::{Sandbox, SandboxCommand, SandboxWorkspace};

use crate::config::constants::{sandbox as sandbox_defaults, timeouts};
use crate::context::RequestContext;
use crate::error::ErrorCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Static descriptor of a supported language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    pub name: String,
    pub version: String,
    pub file_extensions: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub keywords: Vec<String>,
    pub standard_library_summary: String,
}

/// Limits enforced on every execution. `network` and `filesystem` state whether
/// the program may reach them at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_memory_bytes: u64,
    pub max_cpu_seconds: u64,
    pub max_processes: u32,
    pub max_output_bytes: usize,
    pub max_file_bytes: u64,
    pub network: bool,
    pub filesystem: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub stdin: Option<String>,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub allow_network: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    CpuTime,
    WallTime,
    Memory,
    Output,
    FileSize,
}

impl LimitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKind::CpuTime => "cpu_time",
            LimitKind::WallTime => "wall_time",
            LimitKind::Memory => "memory",
            LimitKind::Output => "output",
            LimitKind::FileSize => "file_size",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Wall-clock time of the run phase
    pub wall_time_ms: u64,
    /// Time spent compiling, for compiled languages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_time_ms: Option<u64>,
    pub output_bytes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_exceeded: Option<LimitKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    pub network_isolated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
    pub truncated: bool,
    pub resource_usage: ResourceUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub rule: String,
}

/// Language-derived facts reported alongside findings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisFacts {
    pub lines: usize,
    pub functions: Vec<String>,
    pub imports: Vec<String>,
    pub has_entry_point: bool,
    pub syntax_ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub language: String,
    pub findings: Vec<Finding>,
    pub facts: AnalysisFacts,
}

impl Analysis {
    pub fn has_errors(&self) -> bool {
        self.findings
            .iter()
            .any(|finding| finding.severity == Severity::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LanguageError {
    #[error("empty_code: no source code supplied")]
    EmptyCode,
    #[error("syntax error at line {line}, column {column}: {message}")]
    SyntaxError {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("language '{0}' is not supported")]
    NotFound(String),
    #[error("{language} toolchain unavailable: '{program}' not found on PATH")]
    ToolchainUnavailable { language: String, program: String },
    #[error("invalid execution request: {0}")]
    InvalidRequest(String),
    #[error("sandbox failure: {0}")]
    Sandbox(String),
    #[error("execution cancelled")]
    Cancelled,
}

impl LanguageError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LanguageError::EmptyCode
            | LanguageError::SyntaxError { .. }
            | LanguageError::InvalidRequest(_) => ErrorCode::InvalidInput,
            LanguageError::NotFound(_) => ErrorCode::LanguageNotFound,
            LanguageError::Cancelled => ErrorCode::AgentTimeout,
            LanguageError::ToolchainUnavailable { .. } | LanguageError::Sandbox(_) => {
                ErrorCode::Internal
            }
        }
    }
}

/// Analyze and execute capability for one language
#[async_trait]
pub trait LanguageProvider: Send + Sync {
    fn language(&self) -> &Language;

    fn resource_limits(&self) -> ResourceLimits;

    /// Whether programs may read stdin interactively
    fn supports_interactive(&self) -> bool {
        false
    }

    /// Whether a request may opt into network access
    fn supports_network(&self) -> bool {
        false
    }

    /// Parse-only check; fails with `EmptyCode` for blank input
    async fn validate(&self, ctx: &RequestContext, code: &str) -> Result<(), LanguageError>;

    /// Static inspection. Never executes the code and is pure in `code`.
    async fn analyze(&self, ctx: &RequestContext, code: &str) -> Result<Analysis, LanguageError>;

    /// Run the code in the sandbox under [`LanguageProvider::resource_limits`]
    async fn execute(
        &self,
        ctx: &RequestContext,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, LanguageError>;
}

/// Providers for the languages compiled into this crate, by canonical lowercase name
pub fn builtin_provider(
    name: &str,
    sandbox: Arc<Sandbox>,
) -> Option<Arc<dyn LanguageProvider>> {
    match name.to_ascii_lowercase().as_str() {
        "go" | "golang" => Some(Arc::new(go::GoProvider::new(sandbox))),
        "python" | "py" | "python3" => Some(Arc::new(python::PythonProvider::new(sandbox))),
        "javascript" | "js" | "node" => {
            Some(Arc::new(javascript::JavaScriptProvider::new(sandbox)))
        }
        "rust" | "rs" => Some(Arc::new(rust::RustProvider::new(sandbox))),
        _ => None,
    }
}

/// Validated run-phase timeout of a request, clamped to the execution ceiling
pub fn execution_timeout(request: &ExecutionRequest) -> Result<Duration, LanguageError> {
    if request.code.trim().is_empty() {
        return Err(LanguageError::EmptyCode);
    }
    if request.timeout_seconds == 0 {
        return Err(LanguageError::InvalidRequest(
            "timeout must be at least 1 second".to_string(),
        ));
    }
    Ok(Duration::from_secs(
        request.timeout_seconds.min(timeouts::EXECUTION_MAX_SECS),
    ))
}

/// Limits for the run phase: CPU time never outlives the wall-clock timeout by much
pub(crate) fn run_limits(limits: ResourceLimits, timeout: Duration) -> ResourceLimits {
    ResourceLimits {
        max_cpu_seconds: limits.max_cpu_seconds.min(timeout.as_secs() + 1),
        ..limits
    }
}

/// Limits for compiler invocations, which need more processes and disk than the program
pub(crate) fn build_limits(limits: ResourceLimits) -> ResourceLimits {
    ResourceLimits {
        max_cpu_seconds: sandbox_defaults::BUILD_MAX_CPU_SECS,
        max_processes: limits.max_processes.max(sandbox_defaults::BUILD_MAX_PROCESSES),
        max_file_bytes: sandbox_defaults::BUILD_MAX_FILE_BYTES,
        ..limits
    }
}

/// Fold a successful build into the result of the run that followed it
pub(crate) fn with_build_time(
    mut result: ExecutionResult,
    build: &ExecutionResult,
) -> ExecutionResult {
    result.resource_usage.build_time_ms = Some(build.duration_ms);
    result
}

pub(crate) fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
