//! Handlers of the `/api/v1` surface

use super::error::{ApiError, status_of};
use super::extract::ApiJson;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use coding_expert_core::agent::prompts::debug_query;
use coding_expert_core::agent::{
    AgentInput, AgentOutput, ContextMap, Metadata, Step, ToolCallRecord,
};
use coding_expert_core::config::constants::timeouts;
use coding_expert_core::languages::{
    Analysis, ExecutionRequest, ExecutionResult, Language, execution_timeout,
};
use coding_expert_core::{ErrorCode, RequestContext, Runtime};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub fn api_router() -> Router<Runtime> {
    Router::new()
        .route("/coding/ask", post(ask))
        .route("/coding/analyze", post(analyze))
        .route("/coding/execute", post(execute))
        .route("/coding/debug", post(debug))
        .route("/health", get(health))
        .route("/languages", get(languages))
        .method_not_allowed_fallback(method_not_allowed)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AskRequest {
    pub query: String,
    #[serde(default)]
    pub context: Option<ContextMap>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzeRequest {
    pub code: String,
    pub language: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecuteRequest {
    pub code: String,
    pub language: String,
    /// Standard input of the program
    #[serde(default)]
    pub input: Option<String>,
    /// Seconds; values above the ceiling are clamped
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebugRequest {
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub context: Option<ContextMap>,
}

/// Body of `/coding/ask` and `/coding/debug`
#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub answer: String,
    /// Number of steps taken
    pub steps: usize,
    pub metadata: Metadata,
    pub trace: Vec<Step>,
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl From<AgentOutput> for AgentResponse {
    fn from(output: AgentOutput) -> Self {
        let (error, code) = match output.error {
            Some(info) => (Some(info.message), Some(info.code)),
            None => (None, None),
        };
        Self {
            answer: output.output,
            steps: output.steps.len(),
            metadata: output.metadata,
            trace: output.steps,
            tool_calls: output.tool_calls,
            error,
            code,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: i64,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LanguagesResponse {
    pub count: usize,
    pub languages: Vec<Language>,
}

/// POST /api/v1/coding/ask
async fn ask(
    State(runtime): State<Runtime>,
    ApiJson(request): ApiJson<AskRequest>,
) -> Result<Response, ApiError> {
    let input = AgentInput {
        query: request.query,
        context: request.context.unwrap_or_default(),
    };
    run_agent(&runtime, input).await
}

/// POST /api/v1/coding/debug
async fn debug(
    State(runtime): State<Runtime>,
    ApiJson(request): ApiJson<DebugRequest>,
) -> Result<Response, ApiError> {
    if request.code.trim().is_empty() {
        return Err(ApiError::invalid_input("code must not be empty"));
    }
    if request.language.trim().is_empty() {
        return Err(ApiError::invalid_input("language must not be empty"));
    }
    // Unknown languages are still debugged by reasoning alone
    let language = runtime
        .languages()
        .get(&request.language)
        .map(|provider| provider.language().name.clone())
        .unwrap_or(request.language);
    let error = request.error.as_deref().filter(|e| !e.trim().is_empty());
    let input = AgentInput {
        query: debug_query(&language, &request.code, error),
        context: request.context.unwrap_or_default(),
    };
    run_agent(&runtime, input).await
}

async fn run_agent(runtime: &Runtime, input: AgentInput) -> Result<Response, ApiError> {
    let token = CancellationToken::new();
    // Dropping the handler (client gone) cancels in-flight tool and LLM calls
    let _cancel_on_drop = token.clone().drop_guard();
    let ctx = runtime.request_context(token);

    let output = runtime.agent().run(&ctx, input).await?;
    let status = output
        .stop_reason()
        .code()
        .map_or(StatusCode::OK, status_of);
    Ok((status, Json(AgentResponse::from(output))).into_response())
}

/// POST /api/v1/coding/analyze
async fn analyze(
    State(runtime): State<Runtime>,
    ApiJson(request): ApiJson<AnalyzeRequest>,
) -> Result<Json<Analysis>, ApiError> {
    let provider = runtime.languages().get(&request.language)?;
    let ctx = direct_context(&runtime, CancellationToken::new());
    let analysis = provider.analyze(&ctx, &request.code).await?;
    Ok(Json(analysis))
}

/// POST /api/v1/coding/execute
async fn execute(
    State(runtime): State<Runtime>,
    ApiJson(request): ApiJson<ExecuteRequest>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let provider = runtime.languages().get(&request.language)?;
    let execution = ExecutionRequest {
        code: request.code,
        language: provider.language().name.clone(),
        stdin: request.input,
        timeout_seconds: request.timeout.unwrap_or(timeouts::EXECUTION_DEFAULT_SECS),
        allow_network: false,
    };
    execution_timeout(&execution)?;

    let token = CancellationToken::new();
    let _cancel_on_drop = token.clone().drop_guard();
    let ctx = direct_context(&runtime, token);
    // Runs detached from the handler so a disconnect reaches the sandbox as a
    // cancellation and the whole process group is killed
    let run = tokio::spawn(async move { provider.execute(&ctx, &execution).await });
    let result = run.await.map_err(|err| {
        ApiError::new(ErrorCode::Internal, format!("execution task failed: {err}"))
    })??;
    Ok(Json(result))
}

/// Direct endpoints bypass the agent and are bounded by the write timeout only
fn direct_context(runtime: &Runtime, token: CancellationToken) -> RequestContext {
    RequestContext::with_token(
        token,
        Duration::from_secs(runtime.config().server.write_timeout_seconds),
    )
}

/// GET /api/v1/health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().timestamp(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/v1/languages
async fn languages(State(runtime): State<Runtime>) -> Json<LanguagesResponse> {
    let languages = runtime.languages().list();
    Json(LanguagesResponse {
        count: languages.len(),
        languages,
    })
}

async fn method_not_allowed() -> ApiError {
    ApiError::new(ErrorCode::MethodNotAllowed, "method not allowed")
}
