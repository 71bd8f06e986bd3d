//! Tool-calling probe against llama-server.
//!
//! Builds a Mistral v3 prompt advertising a weather tool, checks the model
//! asks for it with the expected arguments, feeds the result back and checks
//! the answer mentions it.

pub mod client;
pub mod mistral;
pub mod probe;
pub mod py_json;

pub use client::{Completion, CompletionClient, ToolcallError};
pub use mistral::{render_v3, FunctionCall, Message, Tool, ToolCall};
pub use probe::{run, weather_tool};
