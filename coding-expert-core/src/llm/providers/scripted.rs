use crate::context::{Interrupted, RequestContext};
use crate::llm::provider::{ChatOptions, LLMError, LLMProvider, LLMResponse, Message};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

type Responder = dyn Fn(&[Message], &ChatOptions) -> Result<LLMResponse, LLMError> + Send + Sync;

/// One request as the provider received it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub options: ChatOptions,
}

/// Deterministic provider replaying canned completions.
///
/// Replies are served in order; once the queue is empty the fallback responder
/// (if any) answers. Every request is recorded for later inspection.
pub struct ScriptedProvider {
    model: String,
    replies: Mutex<VecDeque<Result<LLMResponse, LLMError>>>,
    fallback: Option<Arc<Responder>>,
    delay: Option<Duration>,
    supports_tools: bool,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedProvider {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<LLMResponse, LLMError>>,
    {
        Self {
            model: "scripted".to_string(),
            replies: Mutex::new(replies.into_iter().collect()),
            fallback: None,
            delay: None,
            supports_tools: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Provider that answers every request with `responder`
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&[Message], &ChatOptions) -> Result<LLMResponse, LLMError> + Send + Sync + 'static,
    {
        Self::new(Vec::new()).with_fallback(responder)
    }

    pub fn with_fallback<F>(mut self, responder: F) -> Self
    where
        F: Fn(&[Message], &ChatOptions) -> Result<LLMResponse, LLMError> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(responder));
        self
    }

    /// Sleep this long before answering; the sleep observes the request context
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn without_tool_support(mut self) -> Self {
        self.supports_tools = false;
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn remaining_replies(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn supports_tools(&self) -> bool {
        self.supports_tools
    }

    async fn chat(
        &self,
        ctx: &RequestContext,
        messages: &[Message],
        options: &ChatOptions,
    ) -> Result<LLMResponse, LLMError> {
        self.requests.lock().push(RecordedRequest {
            messages: messages.to_vec(),
            options: options.clone(),
        });

        if let Some(delay) = self.delay {
            ctx.sleep(delay).await.map_err(|reason| match reason {
                Interrupted::Cancelled => LLMError::Cancelled,
                Interrupted::DeadlineExceeded => LLMError::Timeout("scripted delay".to_string()),
            })?;
        }

        let next = self.replies.lock().pop_front();
        match (next, &self.fallback) {
            (Some(reply), _) => reply,
            (None, Some(responder)) => responder(messages, options),
            (None, None) => Err(LLMError::InvalidResponse(
                "scripted provider has no replies left".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_in_order_then_falls_back() {
        let provider = ScriptedProvider::new(vec![Ok(LLMResponse::text("first"))])
            .with_fallback(|_, _| Ok(LLMResponse::text("again")));
        let ctx = RequestContext::new(Duration::from_secs(5));
        let messages = vec![Message::user("q".to_string())];
        let options = ChatOptions::default();

        let first = provider.chat(&ctx, &messages, &options).await.unwrap();
        let second = provider.chat(&ctx, &messages, &options).await.unwrap();
        assert_eq!(first.text_content(), Some("first"));
        assert_eq!(second.text_content(), Some("again"));
        assert_eq!(provider.request_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_script_is_an_error() {
        let provider = ScriptedProvider::new(Vec::new());
        let ctx = RequestContext::new(Duration::from_secs(5));
        let result = provider.chat(&ctx, &[], &ChatOptions::default()).await;
        assert!(matches!(result, Err(LLMError::InvalidResponse(_))));
    }
}
