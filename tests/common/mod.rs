#![allow(dead_code)]

use async_trait::async_trait;
use coding_expert::serve;
use coding_expert_core::config::CodingExpertConfig;
use coding_expert_core::config::constants::sandbox as sandbox_defaults;
use coding_expert_core::context::RequestContext;
use coding_expert_core::languages::{
    Analysis, AnalysisFacts, ExecutionRequest, ExecutionResult, Language, LanguageError,
    LanguageProvider, LanguageRegistry, ResourceLimits,
};
use coding_expert_core::llm::{LLMProvider, ScriptedProvider};
use coding_expert_core::tools::{BuiltinToolDeps, ToolRegistry, register_builtin_tools};
use coding_expert_core::Runtime;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Go provider that never runs a toolchain: every program prints `hi`.
/// Programs blocking in `select {}` wait for cancellation instead and are counted.
pub struct FakeGo {
    language: Language,
    cancelled: Arc<AtomicUsize>,
}

impl FakeGo {
    pub fn new() -> Self {
        Self::with_cancel_counter(Arc::default())
    }

    pub fn with_cancel_counter(cancelled: Arc<AtomicUsize>) -> Self {
        Self {
            cancelled,
            language: Language {
                name: "Go".to_string(),
                version: "1.22".to_string(),
                file_extensions: vec![".go".to_string()],
                aliases: vec!["golang".to_string()],
                keywords: vec!["func".to_string(), "package".to_string()],
                standard_library_summary: "fmt, os, strings".to_string(),
            },
        }
    }
}

#[async_trait]
impl LanguageProvider for FakeGo {
    fn language(&self) -> &Language {
        &self.language
    }

    fn resource_limits(&self) -> ResourceLimits {
        ResourceLimits {
            max_memory_bytes: sandbox_defaults::DEFAULT_MAX_MEMORY_BYTES,
            max_cpu_seconds: sandbox_defaults::DEFAULT_MAX_CPU_SECS,
            max_processes: sandbox_defaults::DEFAULT_MAX_PROCESSES,
            max_output_bytes: sandbox_defaults::DEFAULT_MAX_OUTPUT_BYTES,
            max_file_bytes: sandbox_defaults::DEFAULT_MAX_FILE_BYTES,
            network: false,
            filesystem: false,
        }
    }

    async fn validate(&self, _ctx: &RequestContext, code: &str) -> Result<(), LanguageError> {
        if code.trim().is_empty() {
            return Err(LanguageError::EmptyCode);
        }
        Ok(())
    }

    async fn analyze(&self, ctx: &RequestContext, code: &str) -> Result<Analysis, LanguageError> {
        self.validate(ctx, code).await?;
        Ok(Analysis {
            language: self.language.name.clone(),
            findings: Vec::new(),
            facts: AnalysisFacts {
                lines: code.lines().count(),
                has_entry_point: code.contains("func main"),
                syntax_ok: true,
                ..AnalysisFacts::default()
            },
        })
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, LanguageError> {
        self.validate(ctx, &request.code).await?;
        if request.code.contains("select {}") {
            ctx.token().cancelled().await;
            self.cancelled.fetch_add(1, Ordering::SeqCst);
            return Err(LanguageError::Cancelled);
        }
        Ok(ExecutionResult {
            stdout: "hi\n".to_string(),
            exit_code: 0,
            duration_ms: 3,
            ..ExecutionResult::default()
        })
    }
}

pub fn fake_go_registry() -> LanguageRegistry {
    let languages = LanguageRegistry::new();
    languages.register(Arc::new(FakeGo::new())).unwrap();
    languages
}

/// Runtime over `languages` with the offline built-in tools and `llm`
pub fn runtime_with(
    config: CodingExpertConfig,
    languages: LanguageRegistry,
    llm: Arc<dyn LLMProvider>,
) -> Runtime {
    let tools = ToolRegistry::new();
    register_builtin_tools(&tools, BuiltinToolDeps::offline(languages.clone())).unwrap();
    Runtime::from_parts(config, languages, tools, llm)
}

pub fn fake_go_runtime(llm: Arc<ScriptedProvider>) -> Runtime {
    runtime_with(CodingExpertConfig::default(), fake_go_registry(), llm)
}

/// A live server on an ephemeral port; stops when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    pub async fn start(runtime: Runtime) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(runtime, listener, async move {
            let _ = rx.await;
        }));
        Self {
            addr,
            client: reqwest::Client::new(),
            shutdown: Some(tx),
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/api/v1{path}", self.addr)
    }

    /// Fire the shutdown signal
    pub fn begin_shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for `serve` to return
    pub async fn stopped(self) -> anyhow::Result<()> {
        self.task.await.unwrap()
    }
}
