//! Search tools: documentation (retrieval index), Q&A site and code host.
//!
//! All three share one tool shape and differ only in their [`SearchBackend`].

use crate::config::SearchConfig;
use crate::config::constants::{search as search_defaults, tools};
use crate::context::{Interrupted, RequestContext};
use crate::rag::{CodeSearchRequest, RagError, RagPipeline};
use crate::tools::registry::error::{ToolErrorType, ToolExecutionError};
use crate::tools::schema::{PropertySchema, ToolSchema};
use crate::tools::traits::{Tool, ToolCategory};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const SNIPPET_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub language: Option<String>,
    pub max_results: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("rate limited by {0}")]
    RateLimited(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("search cancelled")]
    Cancelled,
}

impl SearchError {
    fn error_type(&self) -> ToolErrorType {
        match self {
            SearchError::Network(_) => ToolErrorType::NetworkError,
            SearchError::Timeout => ToolErrorType::Timeout,
            SearchError::RateLimited(_) => ToolErrorType::RateLimited,
            SearchError::Http { status, .. } if *status >= 500 => ToolErrorType::NetworkError,
            SearchError::Http { .. } | SearchError::InvalidResponse(_) => {
                ToolErrorType::ExecutionError
            }
            SearchError::Unavailable(_) => ToolErrorType::Unsupported,
            SearchError::Cancelled => ToolErrorType::Cancelled,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SearchError::Timeout
        } else if err.is_decode() {
            SearchError::InvalidResponse(err.to_string())
        } else {
            SearchError::Network(err.to_string())
        }
    }

    fn from_interrupted(reason: Interrupted) -> Self {
        match reason {
            Interrupted::Cancelled => SearchError::Cancelled,
            Interrupted::DeadlineExceeded => SearchError::Timeout,
        }
    }
}

impl From<RagError> for SearchError {
    fn from(err: RagError) -> Self {
        if err.is_transient() {
            SearchError::Network(err.to_string())
        } else {
            SearchError::InvalidResponse(err.to_string())
        }
    }
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(
        &self,
        ctx: &RequestContext,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, SearchError>;
}

/// Backend that always reports it is not configured
pub struct UnconfiguredBackend {
    message: &'static str,
}

impl UnconfiguredBackend {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

#[async_trait]
impl SearchBackend for UnconfiguredBackend {
    fn name(&self) -> &'static str {
        "unconfigured"
    }

    async fn search(
        &self,
        _ctx: &RequestContext,
        _query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, SearchError> {
        Err(SearchError::Unavailable(self.message.to_string()))
    }
}

/// Documentation snippets from the retrieval pipeline
pub struct RagBackend {
    pipeline: RagPipeline,
}

impl RagBackend {
    pub fn new(pipeline: RagPipeline) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl SearchBackend for RagBackend {
    fn name(&self) -> &'static str {
        "documentation_index"
    }

    async fn search(
        &self,
        ctx: &RequestContext,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let request = CodeSearchRequest {
            query: query.text.clone(),
            language: query.language.clone(),
            top_k: Some(query.max_results),
        };
        let response = ctx
            .run(self.pipeline.search_code(&request))
            .await
            .map_err(SearchError::from_interrupted)??;
        Ok(response
            .results
            .into_iter()
            .map(|hit| SearchHit {
                title: hit.description.unwrap_or_else(|| hit.id.clone()),
                url: Some(hit.id),
                snippet: truncate_chars(&hit.content, SNIPPET_CHARS),
                score: Some(f64::from(hit.score)),
                source: hit.language,
            })
            .collect())
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn build_client(config: &SearchConfig) -> Result<Client, SearchError> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
        .user_agent(search_defaults::USER_AGENT)
        .build()
        .map_err(|e| SearchError::Network(e.to_string()))
}

/// Map a non-success status to an error; 429 and exhausted-quota 403s are rate limits
fn classify_status(
    service: &str,
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> SearchError {
    let quota_exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|value| value.to_str().ok())
        == Some("0");
    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && quota_exhausted)
        || body.contains("throttle_violation")
    {
        return SearchError::RateLimited(service.to_string());
    }
    SearchError::Http {
        status: status.as_u16(),
        message: truncate_chars(body.trim(), 200),
    }
}

async fn get_json(
    ctx: &RequestContext,
    service: &str,
    request: reqwest::RequestBuilder,
) -> Result<Value, SearchError> {
    let request = request.timeout(ctx.remaining().max(Duration::from_millis(1)));
    let response = ctx
        .run(request.send())
        .await
        .map_err(SearchError::from_interrupted)?
        .map_err(SearchError::from_reqwest)?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = ctx
        .run(response.text())
        .await
        .map_err(SearchError::from_interrupted)?
        .map_err(SearchError::from_reqwest)?;
    if !status.is_success() {
        return Err(classify_status(service, status, &headers, &body));
    }
    serde_json::from_str(&body).map_err(|e| SearchError::InvalidResponse(e.to_string()))
}

/// Questions from a StackExchange site
pub struct StackExchangeBackend {
    client: Client,
    base_url: String,
    site: String,
}

impl StackExchangeBackend {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.stackexchange_url.trim_end_matches('/').to_string(),
            site: config.stackexchange_site.clone(),
        })
    }
}

pub(crate) fn parse_stackexchange(body: &Value) -> Result<Vec<SearchHit>, SearchError> {
    if let Some(message) = body.get("error_message").and_then(Value::as_str) {
        return Err(SearchError::Http {
            status: body.get("error_id").and_then(Value::as_u64).unwrap_or(400) as u16,
            message: message.to_string(),
        });
    }
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::InvalidResponse("missing 'items'".to_string()))?;
    Ok(items
        .iter()
        .map(|item| {
            let answers = item.get("answer_count").and_then(Value::as_u64).unwrap_or(0);
            let answered = item
                .get("is_answered")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let tags: Vec<&str> = item
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| tags.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            SearchHit {
                title: decode_entities(
                    item.get("title")
                        .and_then(Value::as_str)
                        .unwrap_or_default(),
                ),
                url: item.get("link").and_then(Value::as_str).map(str::to_string),
                snippet: format!(
                    "{answers} answers{}; tags: {}",
                    if answered { ", accepted" } else { "" },
                    tags.join(", ")
                ),
                score: item.get("score").and_then(Value::as_f64),
                source: "stackexchange".to_string(),
            }
        })
        .collect())
}

#[async_trait]
impl SearchBackend for StackExchangeBackend {
    fn name(&self) -> &'static str {
        "stackexchange"
    }

    async fn search(
        &self,
        ctx: &RequestContext,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let page_size = query.max_results.to_string();
        let mut params = vec![
            ("order", "desc"),
            ("sort", "relevance"),
            ("q", query.text.as_str()),
            ("site", self.site.as_str()),
            ("pagesize", page_size.as_str()),
        ];
        if let Some(language) = query.language.as_deref() {
            params.push(("tagged", language));
        }
        let request = self
            .client
            .get(format!("{}/search/advanced", self.base_url))
            .query(&params);
        let body = get_json(ctx, self.name(), request).await?;
        parse_stackexchange(&body)
    }
}

/// Code or repository search on GitHub. Code search needs a token; without one the
/// backend falls back to repository search.
pub struct GitHubBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubBackend {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.github_url.trim_end_matches('/').to_string(),
            token: config.github_token.clone().filter(|token| !token.is_empty()),
        })
    }
}

pub(crate) fn parse_github_code(body: &Value) -> Result<Vec<SearchHit>, SearchError> {
    let items = github_items(body)?;
    Ok(items
        .iter()
        .map(|item| {
            let repository = item
                .pointer("/repository/full_name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let path = item.get("path").and_then(Value::as_str).unwrap_or_default();
            SearchHit {
                title: format!("{repository}: {path}"),
                url: item.get("html_url").and_then(Value::as_str).map(str::to_string),
                snippet: item
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                score: item.get("score").and_then(Value::as_f64),
                source: "github_code".to_string(),
            }
        })
        .collect())
}

pub(crate) fn parse_github_repositories(body: &Value) -> Result<Vec<SearchHit>, SearchError> {
    let items = github_items(body)?;
    Ok(items
        .iter()
        .map(|item| {
            let stars = item
                .get("stargazers_count")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let language = item.get("language").and_then(Value::as_str).unwrap_or("n/a");
            let description = item
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            SearchHit {
                title: item
                    .get("full_name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                url: item.get("html_url").and_then(Value::as_str).map(str::to_string),
                snippet: truncate_chars(
                    &format!("{description} ({language}, {stars} stars)"),
                    SNIPPET_CHARS,
                ),
                score: Some(stars as f64),
                source: "github_repositories".to_string(),
            }
        })
        .collect())
}

fn github_items(body: &Value) -> Result<&Vec<Value>, SearchError> {
    body.get("items").and_then(Value::as_array).ok_or_else(|| {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("missing 'items'");
        SearchError::InvalidResponse(message.to_string())
    })
}

#[async_trait]
impl SearchBackend for GitHubBackend {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn search(
        &self,
        ctx: &RequestContext,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let mut q = query.text.clone();
        if let Some(language) = query.language.as_deref() {
            q.push_str(&format!(" language:{language}"));
        }
        let per_page = query.max_results.to_string();
        let endpoint = if self.token.is_some() {
            "code"
        } else {
            "repositories"
        };
        let mut params = vec![("q", q.as_str()), ("per_page", per_page.as_str())];
        if self.token.is_none() {
            params.push(("sort", "stars"));
        }
        let mut request = self
            .client
            .get(format!("{}/search/{endpoint}", self.base_url))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, search_defaults::USER_AGENT)
            .query(&params);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = get_json(ctx, self.name(), request).await?;
        if self.token.is_some() {
            parse_github_code(&body)
        } else {
            parse_github_repositories(&body)
        }
    }
}

/// Tool wrapper shared by the three search tools
pub struct SearchTool {
    name: &'static str,
    description: &'static str,
    backend: Arc<dyn SearchBackend>,
}

impl SearchTool {
    pub fn documentation(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            name: tools::DOCUMENTATION_SEARCH,
            description: "Search the indexed language and library documentation. Returns \
                          ranked snippets with their source.",
            backend,
        }
    }

    pub fn qa_site(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            name: tools::QA_SITE_SEARCH,
            description: "Search programming Q&A (Stack Overflow) for questions similar to \
                          the query. Returns titles, links, scores and answer counts.",
            backend,
        }
    }

    pub fn code_host(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            name: tools::CODE_HOST_SEARCH,
            description: "Search public code on GitHub (code search with a token, repository \
                          search otherwise). Returns matching files or repositories with URLs.",
            backend,
        }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &'static str {
        self.name
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new()
            .required("query", PropertySchema::string("What to search for").non_empty())
            .optional(
                "language",
                PropertySchema::string("Restrict results to this programming language"),
            )
            .optional(
                "max_results",
                PropertySchema::integer("Number of results (default 5)")
                    .range(1.0, search_defaults::MAX_RESULTS_CEILING as f64),
            )
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Search
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(20)
    }

    async fn execute(
        &self,
        ctx: &RequestContext,
        input: Value,
    ) -> Result<Value, ToolExecutionError> {
        let query = SearchQuery {
            text: input
                .get("query")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
            language: input
                .get("language")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|language| !language.is_empty())
                .map(str::to_lowercase),
            max_results: input
                .get("max_results")
                .and_then(Value::as_u64)
                .map(|n| n as usize)
                .unwrap_or(search_defaults::DEFAULT_MAX_RESULTS)
                .clamp(1, search_defaults::MAX_RESULTS_CEILING),
        };

        let results = self.backend.search(ctx, &query).await.map_err(|err| {
            ToolExecutionError::with_original_error(
                self.name,
                err.error_type(),
                format!("{} search failed: {err}", self.backend.name()),
                err.to_string(),
            )
        })?;
        debug!(
            tool = self.name,
            backend = self.backend.name(),
            hits = results.len(),
            "search finished"
        );

        Ok(json!({
            "query": query.text,
            "source": self.backend.name(),
            "count": results.len(),
            "results": results,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagConfig;
    use crate::rag::Metadata;
    use reqwest::header::HeaderValue;

    struct FixedBackend(Result<Vec<SearchHit>, SearchError>);

    #[async_trait]
    impl SearchBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }
        async fn search(
            &self,
            _ctx: &RequestContext,
            query: &SearchQuery,
        ) -> Result<Vec<SearchHit>, SearchError> {
            self.0.clone().map(|mut hits| {
                hits.truncate(query.max_results);
                hits
            })
        }
    }

    fn hit(title: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            url: None,
            snippet: String::new(),
            score: None,
            source: "fixed".to_string(),
        }
    }

    #[tokio::test]
    async fn tool_output_has_count_and_results() {
        let tool = SearchTool::qa_site(Arc::new(FixedBackend(Ok(vec![hit("a"), hit("b")]))));
        let ctx = RequestContext::new(Duration::from_secs(5));
        let output = tool
            .execute(&ctx, json!({ "query": "borrow checker", "max_results": 1 }))
            .await
            .unwrap();
        assert_eq!(output["count"], 1);
        assert_eq!(output["results"][0]["title"], "a");
        assert_eq!(output["source"], "fixed");
    }

    #[tokio::test]
    async fn backend_errors_keep_their_transience() {
        let ctx = RequestContext::new(Duration::from_secs(5));
        let transient = SearchTool::code_host(Arc::new(FixedBackend(Err(SearchError::Timeout))));
        let err = transient.execute(&ctx, json!({ "query": "x" })).await.unwrap_err();
        assert!(err.is_transient());

        let permanent = SearchTool::documentation(Arc::new(UnconfiguredBackend::new(
            "no documentation index is configured",
        )));
        let err = permanent.execute(&ctx, json!({ "query": "x" })).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.message.contains("no documentation index"));
    }

    #[tokio::test]
    async fn documentation_search_reads_the_index() {
        let pipeline = RagPipeline::in_memory(&RagConfig::default());
        let mut metadata = Metadata::new();
        metadata.insert("language".into(), json!("go"));
        metadata.insert("title".into(), json!("Defer"));
        pipeline
            .add_document(
                "go/defer.md",
                "defer schedules a call to run when the function returns",
                metadata,
            )
            .await
            .unwrap();

        let tool = SearchTool::documentation(Arc::new(RagBackend::new(pipeline)));
        let ctx = RequestContext::new(Duration::from_secs(5));
        let output = tool
            .execute(&ctx, json!({ "query": "defer function call", "language": "Go" }))
            .await
            .unwrap();
        assert_eq!(output["count"], 1);
        assert_eq!(output["results"][0]["title"], "Defer");
        assert_eq!(output["results"][0]["url"], "go/defer.md");
    }

    #[test]
    fn parses_stackexchange_items() {
        let body = json!({
            "items": [{
                "title": "Why can&#39;t I borrow &quot;x&quot;?",
                "link": "https://stackoverflow.com/q/1",
                "score": 42,
                "answer_count": 3,
                "is_answered": true,
                "tags": ["rust", "borrow-checker"]
            }]
        });
        let hits = parse_stackexchange(&body).unwrap();
        assert_eq!(hits[0].title, "Why can't I borrow \"x\"?");
        assert_eq!(hits[0].snippet, "3 answers, accepted; tags: rust, borrow-checker");
        assert_eq!(hits[0].score, Some(42.0));

        let err = parse_stackexchange(&json!({
            "error_id": 502,
            "error_message": "too many requests"
        }))
        .unwrap_err();
        assert!(matches!(err, SearchError::Http { status: 502, .. }));
    }

    #[test]
    fn parses_github_payloads() {
        let code = json!({ "items": [{
            "name": "main.go", "path": "cmd/main.go",
            "html_url": "https://github.com/o/r/blob/main/cmd/main.go",
            "repository": { "full_name": "o/r" }, "score": 1.0
        }]});
        assert_eq!(parse_github_code(&code).unwrap()[0].title, "o/r: cmd/main.go");

        let repos = json!({ "items": [{
            "full_name": "o/r", "html_url": "https://github.com/o/r",
            "description": "A tool", "language": "Go", "stargazers_count": 7
        }]});
        assert_eq!(parse_github_repositories(&repos).unwrap()[0].snippet, "A tool (Go, 7 stars)");

        let err = parse_github_code(&json!({ "message": "Bad credentials" })).unwrap_err();
        assert_eq!(err, SearchError::InvalidResponse("Bad credentials".to_string()));
    }

    #[test]
    fn rate_limits_are_recognised() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        assert!(matches!(
            classify_status("github", StatusCode::FORBIDDEN, &headers, ""),
            SearchError::RateLimited(_)
        ));
        let err = classify_status("github", StatusCode::BAD_GATEWAY, &HeaderMap::new(), "oops");
        assert_eq!(err.error_type(), ToolErrorType::NetworkError);
        let err = classify_status(
            "github",
            StatusCode::UNPROCESSABLE_ENTITY,
            &HeaderMap::new(),
            "bad q",
        );
        assert_eq!(err.error_type(), ToolErrorType::ExecutionError);
    }
}
