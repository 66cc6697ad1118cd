mod common;

use common::{FakeGo, TestServer, fake_go_runtime, runtime_with};
use coding_expert_core::config::constants::tools;
use coding_expert_core::config::{CodingExpertConfig, NetworkIsolation};
use coding_expert_core::languages::LanguageRegistry;
use coding_expert_core::languages::sandbox::find_executable;
use coding_expert_core::llm::{LLMError, LLMResponse, ScriptedProvider, ToolCall};
use coding_expert_core::runtime::languages_from_config;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn answers(replies: Vec<LLMResponse>) -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider::new(replies.into_iter().map(Ok)))
}

async fn body(response: reqwest::Response) -> Value {
    response.json::<Value>().await.unwrap()
}

#[tokio::test]
async fn health_reports_healthy_with_numeric_timestamp() {
    let server = TestServer::start(fake_go_runtime(answers(Vec::new()))).await;

    let response = server.client.get(server.url("/health")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_number());
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn languages_lists_registered_providers() {
    let server = TestServer::start(fake_go_runtime(answers(Vec::new()))).await;

    let response = server
        .client
        .get(server.url("/languages"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body(response).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["languages"][0]["name"], "Go");
    assert_eq!(body["languages"][0]["version"], "1.22");
}

#[tokio::test]
async fn ask_answers_directly() {
    let llm = answers(vec![LLMResponse::text(
        "Thought: no tool needed\nFinal Answer: 2 + 2 = 4",
    )]);
    let server = TestServer::start(fake_go_runtime(llm)).await;

    let response = server
        .client
        .post(server.url("/coding/ask"))
        .json(&json!({ "query": "what is 2+2?" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body(response).await;
    assert!(body["answer"].as_str().unwrap().contains('4'));
    assert_eq!(body["steps"], 1);
    assert_eq!(body["metadata"]["stop_reason"], "answered");
    assert!(body["metadata"]["duration_ms"].is_number());
    assert!(body["metadata"]["tokens_used"].is_object());
    assert!(body.get("code").is_none());
}

#[tokio::test]
async fn ask_runs_code_through_the_execution_tool() {
    let program = "package main; import \"fmt\"; func main(){fmt.Println(\"hi\")}";
    let llm = answers(vec![
        LLMResponse::tool_call(
            Some("Run it to see the output.".to_string()),
            ToolCall::function(
                "call-a".to_string(),
                tools::CODE_EXECUTION.to_string(),
                json!({ "language": "go", "code": program }).to_string(),
            ),
        ),
        LLMResponse::text("The program prints hi."),
    ]);
    let server = TestServer::start(fake_go_runtime(llm)).await;

    let response = server
        .client
        .post(server.url("/coding/ask"))
        .json(&json!({ "query": format!("run the Go program: {program}") }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body(response).await;
    assert!(body["steps"].as_u64().unwrap() >= 2);
    let trace = body["trace"].as_array().unwrap();
    let executed = trace
        .iter()
        .find(|step| step["action"] == tools::CODE_EXECUTION)
        .unwrap();
    assert!(executed["observation"].as_str().unwrap().contains("hi"));
    assert!(body["answer"].as_str().unwrap().contains("hi"));
    assert_eq!(body["metadata"]["stop_reason"], "answered");
    assert_eq!(body["tool_calls"][0]["tool_name"], tools::CODE_EXECUTION);
}

#[tokio::test]
async fn execute_rejects_unsupported_language() {
    let server = TestServer::start(fake_go_runtime(answers(Vec::new()))).await;

    let response = server
        .client
        .post(server.url("/coding/execute"))
        .json(&json!({ "code": "++[>+<-]", "language": "Brainfuck" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body(response).await;
    assert_eq!(body["code"], "language_not_found");
    assert!(body["error"].as_str().unwrap().contains("Brainfuck"));
}

#[tokio::test]
async fn execute_returns_the_program_result() {
    let server = TestServer::start(fake_go_runtime(answers(Vec::new()))).await;

    let response = server
        .client
        .post(server.url("/coding/execute"))
        .json(&json!({ "code": "package main", "language": "golang", "input": "x", "timeout": 90 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body(response).await;
    assert_eq!(body["stdout"], "hi\n");
    assert_eq!(body["exit_code"], 0);
    assert_eq!(body["truncated"], false);
}

#[tokio::test]
async fn execute_rejects_zero_timeout() {
    let server = TestServer::start(fake_go_runtime(answers(Vec::new()))).await;

    let response = server
        .client
        .post(server.url("/coding/execute"))
        .json(&json!({ "code": "package main", "language": "Go", "timeout": 0 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["code"], "invalid_input");
}

#[tokio::test]
async fn infinite_loop_is_stopped_by_the_time_limit() {
    if find_executable("go").is_none() {
        eprintln!("skipping: go toolchain not found");
        return;
    }
    let cache = tempfile::tempdir().unwrap();
    let mut config = CodingExpertConfig::default();
    config.sandbox.languages = vec!["go".to_string()];
    config.sandbox.network_isolation = NetworkIsolation::None;
    config.sandbox.cache_dir = Some(cache.path().to_path_buf());
    let languages = languages_from_config(&config.sandbox).await.unwrap();
    let server = TestServer::start(runtime_with(config, languages, answers(Vec::new()))).await;

    let response = server
        .client
        .post(server.url("/coding/execute"))
        .json(&json!({ "code": "for{}", "language": "Go", "timeout": 2 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body(response).await;
    assert_ne!(body["exit_code"], 0);
    let duration = body["duration_ms"].as_u64().unwrap();
    assert!((1800..=3000).contains(&duration), "duration_ms = {duration}");
    let stderr = body["stderr"].as_str().unwrap().to_lowercase();
    assert!(stderr.contains("cpu") || stderr.contains("time"), "stderr = {stderr}");
}

#[tokio::test]
async fn analyze_bypasses_the_agent() {
    let llm = answers(Vec::new());
    let server = TestServer::start(fake_go_runtime(llm.clone())).await;

    let response = server
        .client
        .post(server.url("/coding/analyze"))
        .json(&json!({ "code": "package main\nfunc main() {}\n", "language": "go" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body(response).await;
    assert_eq!(body["language"], "Go");
    assert_eq!(body["facts"]["has_entry_point"], true);
    assert_eq!(llm.request_count(), 0);
}

#[tokio::test]
async fn debug_synthesizes_a_query_for_the_agent() {
    let llm = Arc::new(ScriptedProvider::from_fn(|messages, _| {
        let asked = messages.iter().any(|m| {
            m.content.contains("Debug this Go code") && m.content.contains("index out of range")
        });
        let answer = if asked {
            "Final Answer: check the slice bounds"
        } else {
            "Final Answer: ?"
        };
        Ok(LLMResponse::text(answer))
    }));
    let server = TestServer::start(fake_go_runtime(llm)).await;

    let response = server
        .client
        .post(server.url("/coding/debug"))
        .json(&json!({
            "code": "package main\nfunc main() { s := []int{}; _ = s[1] }",
            "language": "golang",
            "error": "panic: runtime error: index out of range [1] with length 0",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["answer"], "check the slice bounds");
}

#[tokio::test]
async fn empty_query_is_invalid_input() {
    let server = TestServer::start(fake_go_runtime(answers(Vec::new()))).await;

    let response = server
        .client
        .post(server.url("/coding/ask"))
        .json(&json!({ "query": "" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body(response).await;
    assert_eq!(body["code"], "invalid_input");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn unknown_fields_are_rejected() {
    let server = TestServer::start(fake_go_runtime(answers(Vec::new()))).await;

    let response = server
        .client
        .post(server.url("/coding/ask"))
        .json(&json!({ "query": "hi", "temperature": 2 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["code"], "invalid_input");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let mut config = CodingExpertConfig::default();
    config.server.request_max_bytes = 64;
    let runtime = runtime_with(config, common::fake_go_registry(), answers(Vec::new()));
    let server = TestServer::start(runtime).await;

    let response = server
        .client
        .post(server.url("/coding/ask"))
        .json(&json!({ "query": "x".repeat(256) }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body(response).await["code"], "payload_too_large");
}

#[tokio::test]
async fn non_json_content_type_is_rejected() {
    let server = TestServer::start(fake_go_runtime(answers(Vec::new()))).await;

    let response = server
        .client
        .post(server.url("/coding/ask"))
        .header("content-type", "text/plain")
        .body(r#"{"query":"hi"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body(response).await["code"], "unsupported_media_type");
}

#[tokio::test]
async fn wrong_method_and_unknown_path_have_json_errors() {
    let server = TestServer::start(fake_go_runtime(answers(Vec::new()))).await;

    let response = server
        .client
        .get(server.url("/coding/ask"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body(response).await["code"], "method_not_allowed");

    let response = server
        .client
        .get(server.url("/nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(response).await["code"], "not_found");
}

#[tokio::test]
async fn agent_timeout_returns_408_with_an_answer() {
    let mut config = CodingExpertConfig::default();
    config.agent.timeout_seconds = 1;
    config.agent.finalization_grace_seconds = 1;
    let llm = Arc::new(
        ScriptedProvider::from_fn(|_, _| Ok(LLMResponse::text("Final Answer: late")))
            .with_delay(Duration::from_secs(5)),
    );
    let runtime = runtime_with(config, common::fake_go_registry(), llm);
    let server = TestServer::start(runtime).await;

    let response = server
        .client
        .post(server.url("/coding/ask"))
        .json(&json!({ "query": "take your time" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    let body = body(response).await;
    assert_eq!(body["metadata"]["stop_reason"], "timeout");
    assert_eq!(body["code"], "agent_timeout");
    assert!(body["answer"].is_string());
}

#[tokio::test]
async fn llm_failure_is_a_bad_gateway() {
    let llm = Arc::new(ScriptedProvider::new(vec![Err(LLMError::Authentication(
        "invalid key".to_string(),
    ))]));
    let server = TestServer::start(fake_go_runtime(llm)).await;

    let response = server
        .client
        .post(server.url("/coding/ask"))
        .json(&json!({ "query": "hello" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body(response).await;
    assert_eq!(body["metadata"]["stop_reason"], "llm_error");
    assert_eq!(body["code"], "llm_fatal");
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let server = TestServer::start(fake_go_runtime(answers(Vec::new()))).await;

    let response = server
        .client
        .request(reqwest::Method::OPTIONS, server.url("/coding/ask"))
        .header("origin", "http://example.test")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
}

#[tokio::test]
async fn shutdown_lets_in_flight_requests_finish() {
    let llm = Arc::new(
        ScriptedProvider::new(vec![Ok(LLMResponse::text("Final Answer: drained"))])
            .with_delay(Duration::from_millis(500)),
    );
    let mut server = TestServer::start(fake_go_runtime(llm)).await;
    let in_flight = tokio::spawn(
        server
            .client
            .post(server.url("/coding/ask"))
            .json(&json!({ "query": "take your time" }))
            .send(),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    server.begin_shutdown();
    let response = in_flight.await.unwrap().unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["answer"], "drained");
    let addr = server.addr;
    tokio::time::timeout(Duration::from_secs(5), server.stopped())
        .await
        .unwrap()
        .unwrap();
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn shutdown_abandons_requests_after_the_grace_period() {
    let mut config = CodingExpertConfig::default();
    config.server.shutdown_grace_seconds = 1;
    let llm = Arc::new(
        ScriptedProvider::new(vec![Ok(LLMResponse::text("Final Answer: too late"))])
            .with_delay(Duration::from_secs(30)),
    );
    let runtime = runtime_with(config, common::fake_go_registry(), llm);
    let mut server = TestServer::start(runtime).await;
    let _stuck = tokio::spawn(
        server
            .client
            .post(server.url("/coding/ask"))
            .json(&json!({ "query": "never finishes" }))
            .send(),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = std::time::Instant::now();
    server.begin_shutdown();
    tokio::time::timeout(Duration::from_secs(5), server.stopped())
        .await
        .unwrap()
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(900));
}

#[tokio::test]
async fn client_disconnect_cancels_a_direct_execution() {
    let cancelled = Arc::new(AtomicUsize::new(0));
    let languages = LanguageRegistry::new();
    languages
        .register(Arc::new(FakeGo::with_cancel_counter(cancelled.clone())))
        .unwrap();
    let runtime = runtime_with(CodingExpertConfig::default(), languages, answers(Vec::new()));
    let server = TestServer::start(runtime).await;

    let result = server
        .client
        .post(server.url("/coding/execute"))
        .timeout(Duration::from_millis(300))
        .json(&json!({
            "code": "package main\nfunc main() { select {} }",
            "language": "Go"
        }))
        .send()
        .await;
    assert!(result.is_err());

    for _ in 0..60 {
        if cancelled.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(cancelled.load(Ordering::SeqCst), 1);
}
