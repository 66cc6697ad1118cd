//! Parser for the textual ReAct grammar
//!
//! ```text
//! Thought: <reasoning>
//! Action: <tool_name>
//! Action Input: <JSON object>
//! ```
//! or `Thought: ...` followed by `Final Answer: <answer>`.
//! Markers are matched at line starts, case-insensitively.

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum TextAction {
    Tool {
        thought: String,
        name: String,
        input: Value,
    },
    Final {
        thought: String,
        answer: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Thought,
    ActionInput,
    Action,
    FinalAnswer,
    Observation,
}

// "Action Input" must be tried before "Action"
const MARKERS: &[(&str, Marker)] = &[
    ("thought", Marker::Thought),
    ("action input", Marker::ActionInput),
    ("action", Marker::Action),
    ("final answer", Marker::FinalAnswer),
    ("observation", Marker::Observation),
];

#[derive(Debug)]
struct Section {
    marker: Marker,
    /// Offset of the marker line
    line_start: usize,
    body_start: usize,
    body_end: usize,
}

/// Parse a completion written in the textual grammar. `None` means the text uses
/// no usable marker.
pub fn parse(text: &str) -> Option<TextAction> {
    let sections = sections(text);
    let first = sections.first()?;

    let thought = sections
        .iter()
        .find(|s| s.marker == Marker::Thought)
        .map(|s| body(text, s))
        .unwrap_or_else(|| text[..first.line_start].trim().to_string());

    let action = sections.iter().position(|s| s.marker == Marker::Action);
    let final_answer = sections.iter().position(|s| s.marker == Marker::FinalAnswer);

    if let Some(index) = action.filter(|index| final_answer.is_none_or(|f| *index < f)) {
        if let Some((name, input)) = tool_request(text, &sections[index..]) {
            return Some(TextAction::Tool {
                thought,
                name,
                input,
            });
        }
    }

    final_answer.map(|index| TextAction::Final {
        thought,
        answer: text[sections[index].body_start..].trim().to_string(),
    })
}

fn tool_request(text: &str, sections: &[Section]) -> Option<(String, Value)> {
    let (action, rest) = sections.split_first()?;
    let name = body(text, action)
        .lines()
        .next()
        .unwrap_or_default()
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '`' | '"' | '\'' | '*'))
        .to_string();
    if name.is_empty() {
        return None;
    }
    let input = rest
        .iter()
        .take_while(|s| s.marker != Marker::Action)
        .find(|s| s.marker == Marker::ActionInput)
        .map(|s| parse_input(&text[s.body_start..s.body_end]))
        .unwrap_or_else(|| Some(Value::Object(Map::new())))?;
    Some((name, input))
}

fn sections(text: &str) -> Vec<Section> {
    let mut found: Vec<Section> = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let trimmed = line.trim_start().trim_start_matches("**");
        let skipped = line.len() - indent - trimmed.len();
        if let Some((marker, consumed)) = match_marker(trimmed) {
            if let Some(previous) = found.last_mut() {
                previous.body_end = offset;
            }
            found.push(Section {
                marker,
                line_start: offset,
                body_start: offset + indent + skipped + consumed,
                body_end: text.len(),
            });
        }
        offset += line.len();
    }
    found
}

/// Marker at the start of `line` and the bytes it spans, colon included
fn match_marker(line: &str) -> Option<(Marker, usize)> {
    MARKERS.iter().find_map(|(label, marker)| {
        let head = line.get(..label.len())?;
        if !head.eq_ignore_ascii_case(label) {
            return None;
        }
        let rest = &line[label.len()..];
        let after_bold = rest.trim_start_matches("**");
        let colon = after_bold.strip_prefix(':')?;
        let colon = colon.trim_start_matches("**");
        Some((*marker, line.len() - colon.len()))
    })
}

fn body(text: &str, section: &Section) -> String {
    text[section.body_start..section.body_end].trim().to_string()
}

/// Action input as a JSON object; code fences and surrounding prose are tolerated
fn parse_input(raw: &str) -> Option<Value> {
    let trimmed = strip_fences(raw.trim());
    if trimmed.is_empty() {
        return Some(Value::Object(Map::new()));
    }
    let candidates = [
        Some(trimmed),
        match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => Some(&trimmed[start..=end]),
            _ => None,
        },
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
        .filter(Value::is_object)
}

fn strip_fences(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.split_once('\n').map_or("", |(_, rest)| rest);
    inner.trim_end().trim_end_matches("```").trim()
}
