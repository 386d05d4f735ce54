//! The text protocol narrators use to request tool calls.
//!
//! A call is two prefixed lines inside otherwise free-form prose:
//!
//! ```text
//! TOOL_CALL: roll_dice
//! ARGUMENTS: {"notation": "1d20", "context": "Perception"}
//! ```
//!
//! Arguments may span several lines; collection continues until brackets
//! balance and any code fence is closed. Calls that cannot be decoded are
//! reported as [`RejectedCall`]s and never executed.

pub mod sanitize;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const TOOL_CALL_PREFIX: &str = "TOOL_CALL:";
pub const ARGUMENTS_PREFIX: &str = "ARGUMENTS:";

/// A request to run one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    pub args: Value,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }
}

/// What became of one executed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResult {
    Success { tool: String, args: Value, result: Value },
    Failure { tool: String, error: String },
}

impl ToolResult {
    pub fn tool(&self) -> &str {
        match self {
            ToolResult::Success { tool, .. } | ToolResult::Failure { tool, .. } => tool,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success { .. })
    }

    pub fn result(&self) -> Option<&Value> {
        match self {
            ToolResult::Success { result, .. } => Some(result),
            ToolResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ToolResult::Success { .. } => None,
            ToolResult::Failure { error, .. } => Some(error),
        }
    }

    /// The value shown to the narrator: the result, or `{"error": ...}`.
    pub fn payload(&self) -> Value {
        match self {
            ToolResult::Success { result, .. } => result.clone(),
            ToolResult::Failure { error, .. } => serde_json::json!({ "error": error }),
        }
    }
}

/// Why a call found in the text was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RejectReason {
    #[error("no ARGUMENTS line followed the call")]
    MissingArguments,
    #[error("another TOOL_CALL started before the arguments were closed")]
    Interrupted,
    #[error("TOOL_CALL line names no tool")]
    EmptyToolName,
    #[error("arguments are not valid JSON: {0}")]
    InvalidJson(String),
    #[error("arguments must be a JSON object")]
    NotAnObject,
}

/// A call the parser found but refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedCall {
    pub tool: Option<String>,
    /// 1-based line of the `TOOL_CALL:` that opened the call.
    pub line: usize,
    pub reason: RejectReason,
}

/// Every call in a response, in the order they appear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub calls: Vec<ToolCall>,
    pub rejected: Vec<RejectedCall>,
}

/// A piece of a response for progressive display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResponsePart {
    Narrative { content: String },
    Tool { tool: String, args: Value },
}

enum ParseState {
    Scanning,
    ExpectArgs {
        tool: String,
        start: usize,
    },
    Accumulating {
        tool: String,
        start: usize,
        raw: String,
        balance: i64,
    },
}

/// Lines `start..=end` belong to a call; `call` indexes accepted calls.
struct CallSpan {
    start: usize,
    end: usize,
    call: Option<usize>,
}

#[derive(Default)]
struct Parser {
    parsed: ParsedResponse,
    spans: Vec<CallSpan>,
}

impl Parser {
    fn run(mut self, text: &str) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        let mut state = ParseState::Scanning;
        let mut idx = 0;

        while idx < lines.len() {
            let (next, consumed) = self.step(state, lines[idx], idx);
            state = next;
            if consumed {
                idx += 1;
            }
        }

        match state {
            ParseState::Scanning => {}
            ParseState::ExpectArgs { tool, start } => {
                self.reject(Some(tool), start, lines.len().saturating_sub(1), RejectReason::MissingArguments);
            }
            ParseState::Accumulating { tool, start, raw, .. } => {
                self.finish(tool, start, lines.len().saturating_sub(1), &raw);
            }
        }
        self
    }

    /// Advance one line. Returns false when the line must be seen again.
    fn step(&mut self, state: ParseState, line: &str, idx: usize) -> (ParseState, bool) {
        let trimmed = line.trim();
        match state {
            ParseState::Scanning => {
                let Some(rest) = trimmed.strip_prefix(TOOL_CALL_PREFIX) else {
                    return (ParseState::Scanning, true);
                };
                let tool = rest.trim();
                if tool.is_empty() {
                    self.reject(None, idx, idx, RejectReason::EmptyToolName);
                    return (ParseState::Scanning, true);
                }
                let state = ParseState::ExpectArgs {
                    tool: tool.to_string(),
                    start: idx,
                };
                (state, true)
            }
            ParseState::ExpectArgs { tool, start } => {
                if trimmed.is_empty() {
                    return (ParseState::ExpectArgs { tool, start }, true);
                }
                let Some(rest) = trimmed.strip_prefix(ARGUMENTS_PREFIX) else {
                    self.reject(Some(tool), start, idx - 1, RejectReason::MissingArguments);
                    return (ParseState::Scanning, false);
                };
                let raw = rest.trim().to_string();
                let balance = bracket_balance(&raw);
                if needs_more(&raw, balance) {
                    (ParseState::Accumulating { tool, start, raw, balance }, true)
                } else {
                    self.finish(tool, start, idx, &raw);
                    (ParseState::Scanning, true)
                }
            }
            ParseState::Accumulating {
                tool,
                start,
                mut raw,
                balance,
            } => {
                if trimmed.starts_with(TOOL_CALL_PREFIX) {
                    self.reject(Some(tool), start, idx - 1, RejectReason::Interrupted);
                    return (ParseState::Scanning, false);
                }
                raw.push('\n');
                raw.push_str(line);
                let balance = balance + bracket_balance(line);
                if needs_more(&raw, balance) {
                    (ParseState::Accumulating { tool, start, raw, balance }, true)
                } else {
                    self.finish(tool, start, idx, &raw);
                    (ParseState::Scanning, true)
                }
            }
        }
    }

    fn finish(&mut self, tool: String, start: usize, end: usize, raw: &str) {
        match decode_arguments(raw) {
            Ok(args) => {
                self.spans.push(CallSpan {
                    start,
                    end,
                    call: Some(self.parsed.calls.len()),
                });
                self.parsed.calls.push(ToolCall::new(tool, args));
            }
            Err(reason) => self.reject(Some(tool), start, end, reason),
        }
    }

    fn reject(&mut self, tool: Option<String>, start: usize, end: usize, reason: RejectReason) {
        tracing::warn!(tool = ?tool, line = start + 1, %reason, "rejected tool call");
        self.spans.push(CallSpan { start, end, call: None });
        self.parsed.rejected.push(RejectedCall {
            tool,
            line: start + 1,
            reason,
        });
    }
}

fn bracket_balance(s: &str) -> i64 {
    s.chars().fold(0, |balance, c| match c {
        '{' | '[' => balance + 1,
        '}' | ']' => balance - 1,
        _ => balance,
    })
}

/// Arguments continue while brackets are open or a code fence is unclosed.
fn needs_more(raw: &str, balance: i64) -> bool {
    balance > 0 || raw.matches("```").count() % 2 == 1
}

/// Decode an argument block: strict JSON first, then the repair passes.
pub fn decode_arguments(raw: &str) -> Result<Value, RejectReason> {
    let direct = sanitize::strip_code_fences(raw);
    let value = match serde_json::from_str::<Value>(&direct) {
        Ok(value) => value,
        Err(_) => {
            let repaired = sanitize::sanitize(raw);
            serde_json::from_str::<Value>(&repaired).map_err(|err| {
                tracing::warn!(error = %err, raw, "failed to parse tool arguments");
                RejectReason::InvalidJson(err.to_string())
            })?
        }
    };
    if value.is_object() {
        Ok(value)
    } else {
        Err(RejectReason::NotAnObject)
    }
}

/// Find every tool call in a response, accepted and rejected.
pub fn parse_response(text: &str) -> ParsedResponse {
    Parser::default().run(text).parsed
}

/// Find the tool calls in a response, skipping any that were rejected.
pub fn parse_tool_calls(text: &str) -> Vec<ToolCall> {
    parse_response(text).calls
}

/// Whether the text contains a tool call marker at all.
pub fn has_tool_calls(text: &str) -> bool {
    text.contains(TOOL_CALL_PREFIX)
}

/// The prose of a response with the tool call lines removed.
///
/// Every line of an accepted call goes, including multi-line arguments. Of a
/// rejected call only the marker lines go, since its extent is a guess.
/// Runs of blank lines collapse to one; other lines are kept verbatim.
pub fn extract_narrative(text: &str) -> String {
    let parser = Parser::default().run(text);
    let in_accepted_call = |idx: usize| {
        parser
            .spans
            .iter()
            .any(|span| span.call.is_some() && (span.start..=span.end).contains(&idx))
    };

    let mut kept = Vec::new();
    let mut blank_run = 0;
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with(TOOL_CALL_PREFIX)
            || trimmed.starts_with(ARGUMENTS_PREFIX)
            || in_accepted_call(idx)
        {
            continue;
        }
        if trimmed.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        kept.push(line);
    }
    kept.join("\n").trim().to_string()
}

/// Split a response into prose chunks and accepted tool calls, in order.
///
/// Lines belonging to rejected calls are dropped.
pub fn split_response(text: &str) -> Vec<ResponsePart> {
    let parser = Parser::default().run(text);
    let mut calls = parser.parsed.calls.into_iter().map(Some).collect::<Vec<_>>();
    let mut parts = Vec::new();
    let mut prose = String::new();
    let mut spans = parser.spans.iter().peekable();

    let flush = |prose: &mut String, parts: &mut Vec<ResponsePart>| {
        let content = prose.trim();
        if !content.is_empty() {
            parts.push(ResponsePart::Narrative {
                content: content.to_string(),
            });
        }
        prose.clear();
    };

    for (idx, line) in text.lines().enumerate() {
        match spans.peek().map(|span| (span.start, span.end, span.call)) {
            Some((start, end, call)) if idx >= start => {
                if idx == start {
                    flush(&mut prose, &mut parts);
                    if let Some(call) = call.and_then(|i| calls.get_mut(i)).and_then(Option::take) {
                        parts.push(ResponsePart::Tool {
                            tool: call.tool,
                            args: call.args,
                        });
                    }
                }
                if idx >= end {
                    spans.next();
                }
            }
            _ => {
                prose.push_str(line);
                prose.push('\n');
            }
        }
    }
    flush(&mut prose, &mut parts);
    parts
}

/// The follow-up prompt that hands tool results back to the narrator.
pub fn tool_results_prompt(results: &[ToolResult]) -> String {
    let mut prompt = String::from("TOOL RESULTS:\n");
    for (idx, result) in results.iter().enumerate() {
        let payload = serde_json::to_string_pretty(&result.payload()).unwrap_or_else(|_| "null".to_string());
        prompt.push_str(&format!("{}. {}:\n", idx + 1, result.tool()));
        for line in payload.lines() {
            prompt.push_str("   ");
            prompt.push_str(line);
            prompt.push('\n');
        }
    }
    prompt.push_str("\nNow generate the narrative response incorporating these results. ");
    prompt.push_str("Describe what happens vividly and dramatically. ");
    prompt.push_str("End with \"What do you do?\"");
    prompt
}
