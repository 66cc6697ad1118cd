//! Prompt text of the ReAct loop

use crate::agent::types::ContextMap;
use serde_json::Value;
use std::fmt::Write;

const ROLE: &str = "You are a senior software engineer acting as a coding expert. \
You answer programming questions precisely, verify claims by analyzing or running code \
when that helps, and explain the result in plain language.";

/// System message injected when the model repeats the same call
pub const LOOP_NUDGE: &str = "You are looping: the same action with the same input was \
requested repeatedly. Try a different approach or give your final answer.";

pub const NO_OUTPUT: &str = "(no output)";

/// System prompt listing the tool catalog, the action grammar and the step budget
pub fn system_prompt(catalog: &str, max_steps: usize, native_tools: bool) -> String {
    let mut prompt = String::from(ROLE);
    prompt.push_str("\n\n## Tools\n");
    if catalog.trim().is_empty() {
        prompt.push_str("No tools are available; answer directly.\n");
    } else {
        prompt.push_str(catalog);
    }

    prompt.push_str("\n## How to respond\n");
    if native_tools {
        prompt.push_str(
            "Call a tool through function calling when you need one. \
             When you can answer, reply with the answer as plain text.\n\
             If function calling is unavailable, use the text format below.\n",
        );
    }
    prompt.push_str(
        "To use a tool:\n\
         Thought: <your reasoning>\n\
         Action: <tool name>\n\
         Action Input: <JSON object with the tool arguments>\n\
         \n\
         To answer:\n\
         Thought: <your reasoning>\n\
         Final Answer: <the answer for the user>\n",
    );
    let _ = write!(
        prompt,
        "\nYou have at most {max_steps} steps. Each tool call uses one step. \
         Never invent tool results; wait for the observation."
    );
    prompt
}

/// First user message: the query followed by one labeled section per context entry
pub fn user_message(query: &str, context: &ContextMap) -> String {
    let mut message = query.trim().to_string();
    for (key, value) in context {
        let _ = write!(message, "\n\n## {key}\n{}", render_value(value));
    }
    message
}

/// Instruction for the summarising call after the budget ran out
pub fn finalize_instruction(out_of_time: bool) -> String {
    let budget = if out_of_time { "time" } else { "steps" };
    format!(
        "You are out of {budget}. Summarize your findings so far and give the best final \
         answer you can. Do not call any more tools."
    )
}

/// Query sent to the agent by the debug endpoint
pub fn debug_query(language: &str, code: &str, error: Option<&str>) -> String {
    let fence = language.to_lowercase();
    let mut query = format!("Debug this {language} code:\n```{fence}\n{code}\n```");
    match error.map(str::trim).filter(|error| !error.is_empty()) {
        Some(error) => {
            let _ = write!(query, "\nError: {error}");
        }
        None => query.push_str("\nFind the bug, explain it and show the fix."),
    }
    query
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
