use crate::config::constants::urls;
use crate::context::{Interrupted, RequestContext};
use crate::llm::provider::{
    ChatOptions, FinishReason, FunctionCall, LLMError, LLMProvider, LLMResponse, Message,
    MessageRole, ToolCall, Usage,
};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;

/// Adapter for `/chat/completions` style APIs (OpenAI, OpenRouter and compatible gateways)
pub struct OpenAIProvider {
    name: String,
    api_key: String,
    http_client: HttpClient,
    base_url: String,
    model: String,
}

impl OpenAIProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(
            "openai",
            api_key,
            model,
            urls::OPENAI_API_BASE.to_string(),
            HttpClient::new(),
        )
    }

    pub fn with_base_url(
        name: impl Into<String>,
        api_key: String,
        model: String,
        base_url: String,
        http_client: HttpClient,
    ) -> Self {
        Self {
            name: name.into(),
            api_key,
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        ctx: &RequestContext,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<LLMResponse, LLMError> {
        if messages.is_empty() {
            return Err(LLMError::InvalidRequest(
                "Messages cannot be empty".to_string(),
            ));
        }
        for message in messages {
            message.validate().map_err(LLMError::InvalidRequest)?;
        }
        let body = self.convert_to_openai_format(messages, options);
        let url = format!("{}/chat/completions", self.base_url);

        let response = ctx
            .run(
                self.http_client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .timeout(ctx.remaining())
                    .json(&body)
                    .send(),
            )
            .await
            .map_err(interrupted_error)?
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let error_text = ctx
                .run(response.text())
                .await
                .map_err(interrupted_error)?
                .unwrap_or_default();
            return Err(status_error(status, &error_text, retry_after));
        }

        let payload: Value = ctx
            .run(response.json::<Value>())
            .await
            .map_err(interrupted_error)?
            .map_err(|e| LLMError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        parse_openai_response(payload)
    }
}

impl OpenAIProvider {
    fn convert_to_openai_format(&self, messages: &[Message], options: &ChatOptions) -> Value {
        let messages: Vec<Value> = messages.iter().map(message_to_openai).collect();

        let mut request = json!({
            "model": self.model,
            "messages": messages,
            "temperature": options.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = options.max_tokens {
            request["max_tokens"] = json!(max_tokens);
        }
        if !options.stop.is_empty() {
            request["stop"] = json!(options.stop);
        }
        if let Some(tools) = options.tools.as_ref().filter(|tools| !tools.is_empty()) {
            request["tools"] = json!(tools);
            if let Some(choice) = &options.tool_choice {
                request["tool_choice"] = choice.to_openai_value();
            }
            request["parallel_tool_calls"] = Value::Bool(false);
        }
        request
    }
}

fn message_to_openai(message: &Message) -> Value {
    let mut value = json!({
        "role": message.role.as_openai_str(),
        "content": message.content,
    });

    // Only assistant messages can have tool_calls
    if message.role == MessageRole::Assistant && message.has_tool_calls() {
        value["tool_calls"] = json!(message.tool_calls);
        if message.content.is_empty() {
            value["content"] = Value::Null;
        }
    }
    if message.role == MessageRole::Tool {
        if let Some(tool_call_id) = &message.tool_call_id {
            value["tool_call_id"] = Value::String(tool_call_id.clone());
        }
    }
    value
}

fn interrupted_error(reason: Interrupted) -> LLMError {
    match reason {
        Interrupted::Cancelled => LLMError::Cancelled,
        Interrupted::DeadlineExceeded => {
            LLMError::Timeout("deadline exceeded waiting for provider".to_string())
        }
    }
}

fn transport_error(err: reqwest::Error) -> LLMError {
    if err.is_timeout() {
        LLMError::Timeout(err.to_string())
    } else {
        LLMError::Network(err.to_string())
    }
}

fn status_error(status: StatusCode, body: &str, retry_after: Option<Duration>) -> LLMError {
    let message = format!("HTTP {status}: {}", truncate(body, 512));
    match status.as_u16() {
        401 | 403 => LLMError::Authentication(message),
        429 if body.contains("insufficient_quota") => LLMError::QuotaExceeded(message),
        429 => LLMError::RateLimit {
            message,
            retry_after,
        },
        408 | 504 => LLMError::Timeout(message),
        400 | 404 | 422 => LLMError::InvalidRequest(message),
        _ => LLMError::Provider(message),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

pub(crate) fn parse_openai_response(response_json: Value) -> Result<LLMResponse, LLMError> {
    let choice = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .ok_or_else(|| {
            LLMError::InvalidResponse("Invalid response format: missing choices".to_string())
        })?;

    let message = choice.get("message").ok_or_else(|| {
        LLMError::InvalidResponse("Invalid response format: missing message".to_string())
    })?;

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string());

    let tool_calls: Option<Vec<ToolCall>> = message
        .get("tool_calls")
        .and_then(|tc| tc.as_array())
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let function = call.get("function")?;
                    Some(ToolCall {
                        id: call.get("id")?.as_str()?.to_string(),
                        call_type: "function".to_string(),
                        function: FunctionCall {
                            name: function.get("name")?.as_str()?.to_string(),
                            arguments: function
                                .get("arguments")
                                .and_then(|args| args.as_str())
                                .unwrap_or("{}")
                                .to_string(),
                        },
                    })
                })
                .collect()
        })
        .filter(|calls: &Vec<ToolCall>| !calls.is_empty());

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|fr| fr.as_str())
        .map(FinishReason::from_openai)
        .unwrap_or(if tool_calls.is_some() {
            FinishReason::ToolCalls
        } else {
            FinishReason::Stop
        });

    let usage = response_json.get("usage").map(|u| {
        let field = |name: &str| u.get(name).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        let prompt_tokens = field("prompt_tokens");
        let completion_tokens = field("completion_tokens");
        let total = field("total_tokens");
        Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: if total == 0 {
                prompt_tokens + completion_tokens
            } else {
                total
            },
        }
    });

    if content.is_none() && tool_calls.is_none() && finish_reason == FinishReason::Stop {
        return Err(LLMError::InvalidResponse(
            "response carried neither content nor tool calls".to_string(),
        ));
    }

    Ok(LLMResponse {
        content,
        tool_calls,
        usage,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{ToolChoice, ToolDefinition};

    #[test]
    fn parses_tool_call_response() {
        let payload = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "I should run it",
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "code_execution",
                            "arguments": "{\"language\":\"go\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
        });

        let response = parse_openai_response(payload).unwrap();
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        let call = response.first_tool_call().unwrap();
        assert_eq!(call.function.name, "code_execution");
        assert_eq!(response.usage.unwrap().total_tokens, 20);
        assert_eq!(response.text_content(), Some("I should run it"));
    }

    #[test]
    fn missing_choices_is_invalid_response() {
        let err = parse_openai_response(json!({"object": "error"})).unwrap_err();
        assert!(matches!(err, LLMError::InvalidResponse(_)));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "bad key", None),
            LLMError::Authentication(_)
        ));
        assert!(matches!(
            status_error(
                StatusCode::TOO_MANY_REQUESTS,
                "slow down",
                Some(Duration::from_secs(2))
            ),
            LLMError::RateLimit {
                retry_after: Some(_),
                ..
            }
        ));
        assert!(matches!(
            status_error(
                StatusCode::TOO_MANY_REQUESTS,
                r#"{"error":{"code":"insufficient_quota"}}"#,
                None
            ),
            LLMError::QuotaExceeded(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "upstream", None),
            LLMError::Provider(_)
        ));
    }

    #[test]
    fn request_body_carries_catalog_and_tool_ids() {
        let provider = OpenAIProvider::new("sk".into(), "gpt-test".into());
        let call = ToolCall::function("call_1".into(), "calculator".into(), "{}".into());
        let messages = vec![
            Message::system("be helpful".into()),
            Message::assistant_with_tools(String::new(), vec![call]),
            Message::tool_response("call_1".into(), "4".into()),
        ];
        let options = ChatOptions {
            temperature: 0.0,
            max_tokens: Some(128),
            stop: vec!["Observation:".into()],
            tools: Some(vec![ToolDefinition::function(
                "calculator".into(),
                "math".into(),
                json!({"type": "object"}),
            )]),
            tool_choice: Some(ToolChoice::Auto),
        };

        let body = provider.convert_to_openai_format(&messages, &options);
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["tools"][0]["function"]["name"], "calculator");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["messages"][1]["content"], Value::Null);
        assert_eq!(body["messages"][2]["tool_call_id"], "call_1");
        assert_eq!(body["stop"][0], "Observation:");
    }

    #[tokio::test]
    async fn malformed_history_is_rejected_before_sending() {
        // Nothing listens on the discard port
        let provider = OpenAIProvider::with_base_url(
            "openai",
            "sk".into(),
            "gpt-test".into(),
            "http://127.0.0.1:9".into(),
            HttpClient::new(),
        );
        let mut orphan = Message::tool_response("call_1".into(), "4".into());
        orphan.tool_call_id = None;
        let ctx = RequestContext::new(Duration::from_secs(5));

        let err = provider
            .chat(&ctx, &[Message::user("hi".into()), orphan], &ChatOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LLMError::InvalidRequest(message) if message.contains("tool_call_id")
        ));
    }
}
