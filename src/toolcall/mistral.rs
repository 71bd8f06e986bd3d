//! Text form of the Mistral v3 instruct template with native tool support.
//!
//! The control tokens are rendered as their literal strings so the result can
//! be sent to llama-server's raw `/completion` endpoint, which tokenizes it
//! with special-token parsing enabled.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::py_json;

pub const BOS: &str = "<s>";
pub const EOS: &str = "</s>";
const BEGIN_INST: &str = "[INST]";
const END_INST: &str = "[/INST]";
const BEGIN_TOOLS: &str = "[AVAILABLE_TOOLS]";
const END_TOOLS: &str = "[/AVAILABLE_TOOLS]";
const TOOL_CALLS: &str = "[TOOL_CALLS]";
const BEGIN_TOOL_RESULTS: &str = "[TOOL_RESULTS]";
const END_TOOL_RESULTS: &str = "[/TOOL_RESULTS]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: Function,
}

impl Tool {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            kind: "function".to_string(),
            function: Function {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }
}

/// A call requested by the model: `{"name": ..., "arguments": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    System(String),
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

/// Renders `messages` the way the v3 tokenizer would, as text.
///
/// Tools are only advertised right before the last user turn, and system
/// messages are folded into that turn.
pub fn render_v3(tools: &[Tool], messages: &[Message]) -> serde_json::Result<String> {
    let system: Vec<&str> = messages
        .iter()
        .filter_map(|m| match m {
            Message::System(s) => Some(s.as_str()),
            _ => None,
        })
        .collect();
    let last_user = messages.iter().rposition(|m| matches!(m, Message::User(_)));

    let mut out = String::from(BOS);
    for (i, message) in messages.iter().enumerate() {
        match message {
            Message::System(_) => {}
            Message::User(content) => {
                let is_last = Some(i) == last_user;
                if is_last && !tools.is_empty() {
                    out.push_str(BEGIN_TOOLS);
                    out.push(' ');
                    out.push_str(&py_json::to_string(tools)?);
                    out.push_str(END_TOOLS);
                }
                out.push_str(BEGIN_INST);
                out.push(' ');
                if is_last && !system.is_empty() {
                    out.push_str(&system.join("\n\n"));
                    out.push_str("\n\n");
                }
                out.push_str(content);
                out.push_str(END_INST);
            }
            Message::Assistant {
                content,
                tool_calls,
            } => {
                if !tool_calls.is_empty() {
                    let calls: Vec<Value> = tool_calls
                        .iter()
                        .map(|c| {
                            json!({
                                "name": c.function.name,
                                "arguments": as_json(&c.function.arguments),
                                "id": c.id,
                            })
                        })
                        .collect();
                    out.push_str(TOOL_CALLS);
                    out.push(' ');
                    out.push_str(&py_json::to_string(&calls)?);
                } else if let Some(content) = content {
                    out.push(' ');
                    out.push_str(content);
                }
                out.push_str(EOS);
            }
            Message::Tool {
                tool_call_id,
                content,
                ..
            } => {
                let result = json!({"content": parse_or_string(content), "call_id": tool_call_id});
                out.push_str(BEGIN_TOOL_RESULTS);
                out.push(' ');
                out.push_str(&py_json::to_string(&result)?);
                out.push_str(END_TOOL_RESULTS);
            }
        }
    }
    Ok(out)
}

/// Arguments sent back as a JSON-encoded string are rendered as the object
/// they encode.
fn as_json(arguments: &Value) -> Value {
    match arguments {
        Value::String(s) => parse_or_string(s),
        other => other.clone(),
    }
}

/// Tool output that is valid JSON is embedded as such, anything else as a
/// string.
fn parse_or_string(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
