//! ReAct controller: think, act, observe until an answer or a budget runs out

use crate::agent::prompts::{self, LOOP_NUDGE, NO_OUTPUT};
use crate::agent::text_actions::{self, TextAction};
use crate::agent::types::{
    AgentInput, AgentOutput, Metadata, Step, StopReason, TokenUsage, ToolCallRecord,
};
use crate::config::AgentConfig;
use crate::config::constants::{timeouts, tools as tool_names};
use crate::context::{Interrupted, RequestContext};
use crate::error::{CoreError, ErrorCode, ErrorInfo};
use crate::llm::{
    ChatOptions, FinishReason, LLMError, LLMProvider, LLMResponse, Message, ToolCall, ToolChoice,
};
use crate::retry::{Clock, RetryConfig, RetryFailure, TokioClock, with_retry, with_retry_after};
use crate::tools::{Tool, ToolErrorType, ToolExecutionError, ToolRegistry, ToolSnapshot};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How long a cancelled tool task may take to clean up before it is aborted
const CANCEL_GRACE: Duration = Duration::from_secs(2);
const TRUNCATION_MARKER: &str = "\n...[truncated]";
const LOG_PREVIEW_CHARS: usize = 200;

/// Budgets and switches of one agent
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub max_steps: usize,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
    pub observation_max_bytes: usize,
    pub verbose: bool,
    pub function_calling: bool,
    pub finalization_grace: Duration,
    pub llm_call_timeout: Duration,
    /// Identical consecutive actions that trigger a nudge; 0 disables the check
    pub repeat_threshold: usize,
    pub llm_retry: RetryConfig,
    pub tool_retry: RetryConfig,
}

impl AgentSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            timeout: Duration::from_secs(config.timeout_seconds),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            observation_max_bytes: config.observation_max_bytes,
            verbose: config.verbose,
            function_calling: config.function_calling,
            finalization_grace: Duration::from_secs(config.finalization_grace_seconds),
            llm_call_timeout: Duration::from_secs(config.llm_call_timeout_seconds),
            repeat_threshold: config.repeat_threshold,
            llm_retry: RetryConfig::llm_default(config.llm_max_retries),
            tool_retry: RetryConfig::tool_default(config.tool_max_retries),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

/// Stateless across requests; one instance serves every request of the process
pub struct ReActAgent {
    llm: Arc<dyn LLMProvider>,
    tools: ToolRegistry,
    settings: AgentSettings,
    clock: Arc<dyn Clock>,
}

enum Decision {
    Final { thought: String, answer: String },
    Tool {
        thought: String,
        name: String,
        input: Value,
        origin: Origin,
    },
    Failed(ErrorInfo),
}

/// Where a tool request came from, which decides how the exchange is logged
enum Origin {
    Native(ToolCall),
    Text(String),
}

enum Termination {
    Answered(String),
    MaxSteps,
    Interrupted(Interrupted),
    LlmError(ErrorInfo),
    ToolFatal(ErrorInfo),
}

enum LlmFailure {
    Interrupted(Interrupted),
    Failed(ErrorInfo),
}

#[derive(Debug)]
enum AttemptError {
    Tool(ToolExecutionError),
    Panicked(String),
}

impl AttemptError {
    fn is_transient(&self) -> bool {
        matches!(self, AttemptError::Tool(error) if error.is_transient())
    }
}

struct Acted {
    observation: String,
    record: Option<ToolCallRecord>,
    fatal: Option<ErrorInfo>,
}

struct RunState {
    messages: Vec<Message>,
    steps: Vec<Step>,
    tool_calls: Vec<ToolCallRecord>,
    usage: TokenUsage,
    llm_calls: u32,
    last_observation: Option<String>,
    last_action: Option<(String, Value, usize)>,
}

impl RunState {
    fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            steps: Vec::new(),
            tool_calls: Vec::new(),
            usage: TokenUsage::default(),
            llm_calls: 0,
            last_observation: None,
            last_action: None,
        }
    }

    /// Consecutive occurrences of this action, the current one included
    fn note_action(&mut self, name: &str, input: &Value) -> usize {
        let count = match &self.last_action {
            Some((last_name, last_input, count)) if last_name == name && last_input == input => {
                count + 1
            }
            _ => 1,
        };
        self.last_action = Some((name.to_string(), input.clone(), count));
        count
    }

    fn record_usage(&mut self, response: &LLMResponse) {
        if let Some(usage) = &response.usage {
            self.usage.add(usage);
        }
    }

    fn fallback_answer(&self, budget: &str) -> String {
        self.last_observation
            .clone()
            .unwrap_or_else(|| format!("No answer could be produced before the {budget} ran out."))
    }
}

impl ReActAgent {
    pub fn new(llm: Arc<dyn LLMProvider>, tools: ToolRegistry, settings: AgentSettings) -> Self {
        Self {
            llm,
            tools,
            settings,
            clock: Arc::new(TokioClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.llm
    }

    /// Run the loop for one request.
    ///
    /// Only an empty query is an `Err`; every other failure is reported through
    /// `AgentOutput::error` and `metadata.stop_reason`.
    pub async fn run(
        &self,
        ctx: &RequestContext,
        input: AgentInput,
    ) -> Result<AgentOutput, CoreError> {
        let query = input.query.trim();
        if query.is_empty() {
            return Err(CoreError::InvalidInput("query must not be empty".to_string()));
        }

        let started = Instant::now();
        let ctx = ctx.child(self.settings.timeout);
        let snapshot = self.tools.snapshot();
        let native =
            self.settings.function_calling && self.llm.supports_tools() && !snapshot.is_empty();
        let options = self.chat_options(&snapshot, native);
        let mut state = RunState::new(vec![
            Message::system(prompts::system_prompt(
                &snapshot.catalog(),
                self.settings.max_steps,
                native,
            )),
            Message::user(prompts::user_message(query, &input.context)),
        ]);
        debug!(
            tools = snapshot.len(),
            native_tools = native,
            max_steps = self.settings.max_steps,
            "agent run started"
        );

        let termination = self.drive(&ctx, &snapshot, &options, &mut state).await;
        let (output, stop_reason, error) = self
            .finish(&ctx, &options, &mut state, termination)
            .await;

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            stop_reason = stop_reason.as_str(),
            steps = state.steps.len(),
            tool_calls = state.tool_calls.len(),
            tokens = state.usage.total,
            duration_ms,
            "agent run finished"
        );
        Ok(AgentOutput {
            output,
            steps: state.steps,
            tool_calls: state.tool_calls,
            error,
            metadata: Metadata {
                duration_ms,
                tokens_used: state.usage,
                stop_reason,
                llm_calls: state.llm_calls,
                model: self.llm.model().to_string(),
            },
        })
    }

    fn chat_options(&self, snapshot: &ToolSnapshot, native: bool) -> ChatOptions {
        ChatOptions {
            temperature: self.settings.temperature,
            max_tokens: Some(self.settings.max_tokens),
            // Keeps text-mode models from inventing their own observations
            stop: if native {
                Vec::new()
            } else {
                vec!["\nObservation:".to_string()]
            },
            tools: native.then(|| snapshot.definitions()),
            tool_choice: native.then_some(ToolChoice::Auto),
        }
    }

    async fn drive(
        &self,
        ctx: &RequestContext,
        snapshot: &ToolSnapshot,
        options: &ChatOptions,
        state: &mut RunState,
    ) -> Termination {
        while state.steps.len() < self.settings.max_steps {
            if let Err(reason) = ctx.check() {
                return Termination::Interrupted(reason);
            }
            let step_number = state.steps.len() + 1;

            let response = match self
                .complete(ctx, &state.messages, options, &mut state.llm_calls)
                .await
            {
                Ok(response) => response,
                Err(LlmFailure::Interrupted(reason)) => return Termination::Interrupted(reason),
                Err(LlmFailure::Failed(info)) => return Termination::LlmError(info),
            };
            state.record_usage(&response);

            let (thought, name, input, origin) = match decide(&response) {
                Decision::Failed(info) => return Termination::LlmError(info),
                Decision::Final { thought, answer } => {
                    self.push_step(
                        state,
                        Step {
                            step_number,
                            thought,
                            action: Some(tool_names::FINAL_ANSWER.to_string()),
                            action_input: None,
                            observation: String::new(),
                            tool_call_id: None,
                        },
                    );
                    return Termination::Answered(answer);
                }
                Decision::Tool {
                    thought,
                    name,
                    input,
                    origin,
                } => (thought, name, input, origin),
            };

            let repeats = state.note_action(&name, &input);
            if self.settings.repeat_threshold > 0 && repeats >= self.settings.repeat_threshold {
                warn!(
                    step = step_number,
                    tool = %name,
                    repeats,
                    "repeated action, nudging the model"
                );
                state.last_action = None;
                if !thought.is_empty() {
                    state.messages.push(Message::assistant(thought.clone()));
                }
                state.messages.push(Message::system(LOOP_NUDGE.to_string()));
                self.push_step(
                    state,
                    Step {
                        step_number,
                        thought,
                        action: None,
                        action_input: None,
                        observation: LOOP_NUDGE.to_string(),
                        tool_call_id: None,
                    },
                );
                continue;
            }

            let acted = self.act(ctx, snapshot, step_number, &name, &input).await;
            match origin {
                Origin::Native(mut call) => {
                    if call.id.is_empty() {
                        call.id = format!("call_{step_number}");
                    }
                    let call_id = call.id.clone();
                    state
                        .messages
                        .push(Message::assistant_with_tools(thought.clone(), vec![call]));
                    state
                        .messages
                        .push(Message::tool_response(call_id, acted.observation.clone()));
                }
                Origin::Text(raw) => {
                    state.messages.push(Message::assistant(raw));
                    state
                        .messages
                        .push(Message::user(format!("Observation: {}", acted.observation)));
                }
            }

            let tool_call_id = acted.record.as_ref().map(|record| record.id.clone());
            self.push_step(
                state,
                Step {
                    step_number,
                    thought,
                    action: Some(name),
                    action_input: Some(input),
                    observation: acted.observation.clone(),
                    tool_call_id,
                },
            );
            if let Some(record) = acted.record {
                state.tool_calls.push(record);
            }
            state.last_observation = Some(acted.observation);
            if let Some(info) = acted.fatal {
                return Termination::ToolFatal(info);
            }
        }

        match ctx.check() {
            Err(reason) => Termination::Interrupted(reason),
            Ok(()) => Termination::MaxSteps,
        }
    }

    /// One chat completion with transient-failure retries.
    /// Every attempt gets the lesser of the remaining budget and the per-call cap, and a
    /// provider's `Retry-After` stretches the wait before the next one.
    async fn complete(
        &self,
        ctx: &RequestContext,
        messages: &[Message],
        options: &ChatOptions,
        llm_calls: &mut u32,
    ) -> Result<LLMResponse, LlmFailure> {
        let cap = self.settings.llm_call_timeout;
        let result = with_retry_after(
            ctx,
            self.clock.as_ref(),
            self.settings.llm_retry.backoff(),
            LLMError::is_transient,
            LLMError::retry_after,
            |_| {
                *llm_calls += 1;
                let call_ctx = ctx.child(cap);
                async move {
                    match call_ctx.run(self.llm.chat(&call_ctx, messages, options)).await {
                        Ok(result) => result,
                        Err(Interrupted::Cancelled) => Err(LLMError::Cancelled),
                        Err(Interrupted::DeadlineExceeded) => Err(LLMError::Timeout(format!(
                            "no completion within {}s",
                            cap.as_secs()
                        ))),
                    }
                }
            },
        )
        .await;

        match result {
            Ok((response, _)) => Ok(response),
            Err(RetryFailure::Interrupted { reason, .. }) => Err(LlmFailure::Interrupted(reason)),
            Err(RetryFailure::Failed { error, attempts }) => {
                if let Err(reason) = ctx.check() {
                    return Err(LlmFailure::Interrupted(reason));
                }
                warn!(error = %error, attempts, "LLM call failed");
                Err(LlmFailure::Failed(
                    ErrorInfo::new(error.code(), error.to_string())
                        .with_details(json!({ "attempts": attempts })),
                ))
            }
        }
    }

    async fn act(
        &self,
        ctx: &RequestContext,
        snapshot: &ToolSnapshot,
        step_number: usize,
        name: &str,
        input: &Value,
    ) -> Acted {
        let Some(tool) = snapshot.get(name) else {
            debug!(step = step_number, tool = %name, "model requested an unknown tool");
            let error = ToolExecutionError::not_found(name, &snapshot.names());
            return self.observed(self.render_error(&error), None);
        };
        if let Err(error) = tool.validate(input) {
            debug!(step = step_number, tool = %name, error = %error, "tool input rejected");
            return self.observed(self.render_error(&error), None);
        }

        let id = format!("call_{step_number}");
        let timeout = tool.timeout().min(timeouts::TOOL_CEILING);
        let started = Instant::now();
        let mut attempts = 0;
        let result = with_retry(
            ctx,
            self.clock.as_ref(),
            self.settings.tool_retry.backoff(),
            AttemptError::is_transient,
            |attempt| {
                attempts = attempt;
                execute_once(tool.clone(), ctx.child(timeout), input.clone())
            },
        )
        .await;

        let mut record = ToolCallRecord {
            id,
            tool_name: name.to_string(),
            input: input.clone(),
            output: None,
            error: None,
            duration_ms: started.elapsed().as_millis() as u64,
            attempts,
        };
        let failure = match result {
            Ok((value, _)) => {
                info!(
                    step = step_number,
                    tool = %name,
                    attempts,
                    duration_ms = record.duration_ms,
                    "tool call succeeded"
                );
                let observation = self.truncate(render_output(&value));
                record.output = Some(value);
                return self.observed(observation, Some(record));
            }
            Err(RetryFailure::Failed { error, .. }) => error,
            Err(RetryFailure::Interrupted { last_error, .. }) => last_error,
        };

        match failure {
            AttemptError::Tool(error) => {
                warn!(
                    step = step_number,
                    tool = %name,
                    attempts,
                    error = %error,
                    "tool call failed"
                );
                record.error = Some(error.to_error_info());
                self.observed(self.render_error(&error), Some(record))
            }
            AttemptError::Panicked(message) => {
                warn!(step = step_number, tool = %name, panic = %message, "tool panicked");
                let info = ErrorInfo::new(
                    ErrorCode::ToolFatal,
                    format!("tool '{name}' failed internally"),
                )
                .with_cause(message);
                record.error = Some(info.clone());
                Acted {
                    observation: self.truncate(info.to_string()),
                    record: Some(record),
                    fatal: Some(info),
                }
            }
        }
    }

    fn observed(&self, observation: String, record: Option<ToolCallRecord>) -> Acted {
        Acted {
            observation,
            record,
            fatal: None,
        }
    }

    fn render_error(&self, error: &ToolExecutionError) -> String {
        self.truncate(error.to_json_value().to_string())
    }

    fn truncate(&self, text: String) -> String {
        truncate_observation(text, self.settings.observation_max_bytes)
    }

    async fn finish(
        &self,
        ctx: &RequestContext,
        options: &ChatOptions,
        state: &mut RunState,
        termination: Termination,
    ) -> (String, StopReason, Option<ErrorInfo>) {
        match termination {
            Termination::Answered(answer) => (answer, StopReason::Answered, None),
            Termination::MaxSteps => {
                let answer = self.summarize(ctx, options, state, false).await;
                let error = ErrorInfo::new(
                    ErrorCode::AgentMaxSteps,
                    format!("step budget of {} exhausted", self.settings.max_steps),
                );
                (answer, StopReason::MaxSteps, Some(error))
            }
            Termination::Interrupted(reason) => {
                let answer = self.summarize(ctx, options, state, true).await;
                let message = match reason {
                    Interrupted::Cancelled => "request was cancelled".to_string(),
                    Interrupted::DeadlineExceeded => format!(
                        "time budget of {}s exhausted",
                        self.settings.timeout.as_secs()
                    ),
                };
                (
                    answer,
                    StopReason::Timeout,
                    Some(ErrorInfo::new(ErrorCode::AgentTimeout, message)),
                )
            }
            Termination::LlmError(info) => (
                state.last_observation.clone().unwrap_or_default(),
                StopReason::LlmError,
                Some(info),
            ),
            Termination::ToolFatal(info) => (
                state.last_observation.clone().unwrap_or_default(),
                StopReason::ToolError,
                Some(info),
            ),
        }
    }

    /// Best-effort answer after the step or time budget ran out
    async fn summarize(
        &self,
        ctx: &RequestContext,
        options: &ChatOptions,
        state: &mut RunState,
        out_of_time: bool,
    ) -> String {
        let budget = if out_of_time { "time budget" } else { "step budget" };
        let grace = ctx.grace(self.settings.finalization_grace);
        let mut messages = state.messages.clone();
        messages.push(Message::user(prompts::finalize_instruction(out_of_time)));
        let options = options.without_tools();

        state.llm_calls += 1;
        match grace.run(self.llm.chat(&grace, &messages, &options)).await {
            Ok(Ok(response)) => {
                state.record_usage(&response);
                if let Some(text) = response.text_content() {
                    return match text_actions::parse(text) {
                        Some(TextAction::Final { answer, .. }) if !answer.is_empty() => answer,
                        _ => text.to_string(),
                    };
                }
                warn!("finalization returned no text");
            }
            Ok(Err(error)) => warn!(error = %error, "finalization call failed"),
            Err(reason) => warn!(reason = %reason, "finalization call interrupted"),
        }
        state.fallback_answer(budget)
    }

    fn push_step(&self, state: &mut RunState, step: Step) {
        let action = step.action.as_deref().unwrap_or("-");
        let thought = preview(&step.thought);
        let observation = preview(&step.observation);
        if self.settings.verbose {
            info!(
                step = step.step_number,
                action,
                thought = %thought,
                observation = %observation,
                "agent step"
            );
        } else {
            debug!(
                step = step.step_number,
                action,
                thought = %thought,
                observation = %observation,
                "agent step"
            );
        }
        state.steps.push(step);
    }
}

fn decide(response: &LLMResponse) -> Decision {
    let text = response.text_content().unwrap_or_default();

    if let Some(call) = response.first_tool_call() {
        let input = call
            .parsed_arguments()
            .unwrap_or_else(|_| Value::String(call.function.arguments.clone()));
        return Decision::Tool {
            thought: text.to_string(),
            name: call.function.name.clone(),
            input,
            origin: Origin::Native(call.clone()),
        };
    }

    match &response.finish_reason {
        FinishReason::ContentFilter => {
            return Decision::Failed(ErrorInfo::new(
                ErrorCode::LlmFatal,
                "completion was blocked by the provider's content filter",
            ));
        }
        FinishReason::Error(reason) => {
            return Decision::Failed(ErrorInfo::new(
                ErrorCode::LlmFatal,
                format!("completion ended abnormally: {reason}"),
            ));
        }
        FinishReason::Stop | FinishReason::Length | FinishReason::ToolCalls => {}
    }

    match text_actions::parse(text) {
        Some(TextAction::Tool {
            thought,
            name,
            input,
        }) => Decision::Tool {
            thought,
            name,
            input,
            origin: Origin::Text(text.to_string()),
        },
        Some(TextAction::Final { thought, answer }) if !answer.is_empty() => {
            Decision::Final { thought, answer }
        }
        _ if text.is_empty() => Decision::Failed(ErrorInfo::new(
            ErrorCode::LlmFatal,
            "model returned an empty completion",
        )),
        _ => Decision::Final {
            thought: String::new(),
            answer: text.to_string(),
        },
    }
}

/// Run one attempt on its own task so a panicking tool cannot take the loop down
async fn execute_once(
    tool: Arc<dyn Tool>,
    ctx: RequestContext,
    input: Value,
) -> Result<Value, AttemptError> {
    let name = tool.name();
    let task_ctx = ctx.clone();
    let mut handle = tokio::spawn(async move { tool.execute(&task_ctx, input).await });

    match ctx.run(&mut handle).await {
        Ok(Ok(result)) => result.map_err(AttemptError::Tool),
        Ok(Err(join_error)) => Err(join_failure(name, join_error)),
        Err(reason) => {
            ctx.token().cancel();
            if tokio::time::timeout(CANCEL_GRACE, &mut handle).await.is_err() {
                handle.abort();
            }
            let (error_type, message) = match reason {
                Interrupted::Cancelled => (
                    ToolErrorType::Cancelled,
                    "tool call was cancelled".to_string(),
                ),
                Interrupted::DeadlineExceeded => (
                    ToolErrorType::Timeout,
                    "tool did not finish within its time limit".to_string(),
                ),
            };
            Err(AttemptError::Tool(ToolExecutionError::new(name, error_type, message)))
        }
    }
}

fn join_failure(name: &str, error: JoinError) -> AttemptError {
    if !error.is_panic() {
        return AttemptError::Tool(ToolExecutionError::new(
            name,
            ToolErrorType::Cancelled,
            "tool task was cancelled",
        ));
    }
    let payload = error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|text| text.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    AttemptError::Panicked(message)
}

fn render_output(value: &Value) -> String {
    match value {
        Value::Null => NO_OUTPUT.to_string(),
        Value::String(text) if text.trim().is_empty() => NO_OUTPUT.to_string(),
        Value::String(text) => text.clone(),
        Value::Object(map) if map.is_empty() => NO_OUTPUT.to_string(),
        other => other.to_string(),
    }
}

/// Cut `text` to at most `budget` bytes on a char boundary, marking the cut
pub(crate) fn truncate_observation(mut text: String, budget: usize) -> String {
    if text.len() <= budget {
        return text;
    }
    let keep_marker = budget > TRUNCATION_MARKER.len();
    let mut cut = if keep_marker {
        budget - TRUNCATION_MARKER.len()
    } else {
        budget
    };
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    if keep_marker {
        text.push_str(TRUNCATION_MARKER);
    }
    text
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Usage;

    #[test]
    fn truncation_respects_budget_and_char_boundaries() {
        let text = "é".repeat(3000);
        let cut = truncate_observation(text, 4096);
        assert!(cut.len() <= 4096);
        assert!(cut.ends_with(TRUNCATION_MARKER));

        assert_eq!(truncate_observation("short".to_string(), 4096), "short");
        assert_eq!(truncate_observation("abcdef".to_string(), 3), "abc");
    }

    #[test]
    fn empty_outputs_render_as_placeholder() {
        assert_eq!(render_output(&Value::Null), NO_OUTPUT);
        assert_eq!(render_output(&json!("  ")), NO_OUTPUT);
        assert_eq!(render_output(&json!({})), NO_OUTPUT);
        assert_eq!(render_output(&json!("4")), "4");
        assert_eq!(render_output(&json!({"a": 1})), "{\"a\":1}");
    }

    #[test]
    fn tool_call_wins_over_text() {
        let call = ToolCall::function(
            "c1".into(),
            "calculator".into(),
            "{\"expression\":\"2+2\"}".into(),
        );
        let response = LLMResponse::tool_call(Some("let me compute".into()), call);
        match decide(&response) {
            Decision::Tool { thought, name, input, origin } => {
                assert_eq!(thought, "let me compute");
                assert_eq!(name, "calculator");
                assert_eq!(input, json!({"expression": "2+2"}));
                assert!(matches!(origin, Origin::Native(_)));
            }
            _ => panic!("expected a tool decision"),
        }
    }

    #[test]
    fn malformed_arguments_are_kept_for_validation() {
        let call = ToolCall::function("c1".into(), "calculator".into(), "{oops".into());
        match decide(&LLMResponse::tool_call(None, call)) {
            Decision::Tool { input, .. } => assert_eq!(input, json!("{oops")),
            _ => panic!("expected a tool decision"),
        }
    }

    #[test]
    fn content_filter_is_an_llm_failure() {
        let response =
            LLMResponse::text("partial").with_finish_reason(FinishReason::ContentFilter);
        assert!(matches!(
            decide(&response),
            Decision::Failed(info) if info.code == ErrorCode::LlmFatal
        ));
        let response = LLMResponse::text("").with_usage(Usage::default());
        assert!(matches!(decide(&response), Decision::Failed(_)));
    }

    #[test]
    fn plain_text_is_the_final_answer() {
        match decide(&LLMResponse::text("2 + 2 = 4")) {
            Decision::Final { answer, thought } => {
                assert_eq!(answer, "2 + 2 = 4");
                assert!(thought.is_empty());
            }
            _ => panic!("expected a final answer"),
        }
    }

    #[test]
    fn repeat_counter_resets_on_different_input() {
        let mut state = RunState::new(Vec::new());
        assert_eq!(state.note_action("calculator", &json!({"expression": "1"})), 1);
        assert_eq!(state.note_action("calculator", &json!({"expression": "1"})), 2);
        assert_eq!(state.note_action("calculator", &json!({"expression": "2"})), 1);
    }
}
