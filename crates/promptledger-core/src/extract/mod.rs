//! Tool-call extraction from model output.
//!
//! Two passes over the text: collect every `Action` span and every
//! `ActionInput` span, then bind each action to an input by trimmed tool
//! name. The result has exactly one [`ToolCall`] per `Action` span.

pub mod tokenizer;

use serde_json::{Map, Value};

use crate::model::ToolCall;
use tokenizer::{TagSpan, ACTION, ACTION_INPUT, START};

/// How `Action` spans are bound to `ActionInput` spans of the same tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Pairing {
    /// Every action binds to the first input with its tool name, even if an
    /// earlier action already bound to that input.
    #[default]
    FirstMatch,
    /// Each input binds at most once; later actions take the next unused
    /// input with their tool name.
    Exclusive,
}

impl Pairing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pairing::FirstMatch => "first-match",
            Pairing::Exclusive => "exclusive",
        }
    }
}

impl std::str::FromStr for Pairing {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-match" | "first_match" => Ok(Pairing::FirstMatch),
            "exclusive" => Ok(Pairing::Exclusive),
            other => Err(crate::error::CoreError::Config(format!(
                "unknown pairing policy '{other}' (expected first-match or exclusive)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    pub pairing: Pairing,
}

/// Extract tool calls from one block of model output.
///
/// Never fails: a malformed argument payload becomes `{"raw": payload}`
/// on that call only, and text without `Action` spans yields an empty list.
pub fn extract_tool_calls(text: &str, opts: &ExtractOptions) -> Vec<ToolCall> {
    let actions = ACTION.scan(text);
    if actions.is_empty() {
        return Vec::new();
    }
    let inputs = ACTION_INPUT.scan(text);
    let mut consumed = vec![false; inputs.len()];

    let calls: Vec<ToolCall> = actions
        .iter()
        .map(|action| {
            let tool_name = action.first.trim();
            let description = Some(action.second.trim())
                .filter(|d| !d.is_empty())
                .map(String::from);

            match find_input(&inputs, &consumed, tool_name) {
                Some(idx) => {
                    if opts.pairing == Pairing::Exclusive {
                        consumed[idx] = true;
                    }
                    decode_arguments(tool_name, description, inputs[idx].second)
                }
                None => ToolCall::structured(tool_name, description, Map::new()),
            }
        })
        .collect();

    tracing::debug!(
        "Extracted {} tool call(s) from {} action input(s)",
        calls.len(),
        inputs.len()
    );
    calls
}

/// Number of `<Start>` markers in a prompt, i.e. model turns begun so far.
pub fn count_turns(text: &str) -> usize {
    START.scan(text).len()
}

fn find_input(inputs: &[TagSpan<'_>], consumed: &[bool], tool_name: &str) -> Option<usize> {
    inputs
        .iter()
        .enumerate()
        .find(|(idx, input)| !consumed[*idx] && input.first.trim() == tool_name)
        .map(|(idx, _)| idx)
}

fn decode_arguments(tool_name: &str, description: Option<String>, payload: &str) -> ToolCall {
    match serde_json::from_str::<Value>(payload.trim()) {
        Ok(Value::Object(map)) => ToolCall::structured(tool_name, description, map),
        Ok(_) | Err(_) => ToolCall::raw(tool_name, description, payload),
    }
}
