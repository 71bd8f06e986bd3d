use serde_json::{json, Value};

use super::client::{CompletionClient, ToolcallError};
use super::mistral::{render_v3, FunctionCall, Message, Tool, ToolCall};

pub fn weather_tool() -> Tool {
    Tool::function(
        "get_current_weather",
        "Get the current weather",
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "The city and state, e.g. San Francisco, US or Montréal, CA or Berlin, DE",
                },
                "format": {
                    "type": "string",
                    "enum": ["celsius", "fahrenheit"],
                    "description": "The temperature unit to use. Infer this from the users location.",
                },
            },
            "required": ["location", "format"],
        }),
    )
}

/// The calls a well-behaved model makes for the Paris question.
pub fn expected_calls() -> Vec<FunctionCall> {
    vec![FunctionCall {
        name: "get_current_weather".to_string(),
        arguments: json!({"location": "Paris, FR", "format": "celsius"}),
    }]
}

/// Runs a tool locally.
pub fn call_tool(call: &FunctionCall) -> Result<String, ToolcallError> {
    match call.name.as_str() {
        "get_current_weather" => Ok("43".to_string()),
        other => Err(ToolcallError::UnknownTool(other.to_string())),
    }
}

pub fn call_id(i: usize) -> String {
    format!("c{:08}", i)
}

/// Appends the assistant's requested calls and their local results.
pub fn append_tool_results(
    msgs: &mut Vec<Message>,
    calls: &[FunctionCall],
) -> Result<(), ToolcallError> {
    for (i, call) in calls.iter().enumerate() {
        let id = call_id(i);
        msgs.push(Message::Assistant {
            content: None,
            tool_calls: vec![ToolCall {
                id: id.clone(),
                function: call.clone(),
            }],
        });
        msgs.push(Message::Tool {
            tool_call_id: id,
            name: call.name.clone(),
            content: call_tool(call)?,
        });
    }
    Ok(())
}

async fn exec_msgs(
    client: &CompletionClient,
    seed: u64,
    tools: &[Tool],
    msgs: &[Message],
) -> Result<String, ToolcallError> {
    let prompt = render_v3(tools, msgs)?;
    tracing::info!(%prompt, "rendered prompt");

    println!("  Request:");
    println!("    Seed: {}", seed);
    println!("    Prompt:\n      {:?}", prompt.trim_end());
    let completion = client.complete(&prompt, None, Some(seed)).await?;
    println!("  Model: {}", completion.model);
    let dump = serde_json::from_str::<Value>(&completion.content)
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or_else(|_| completion.content.clone());
    println!("  Result:\n{}", indent(&dump, "    "));
    Ok(completion.content)
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|l| format!("{}{}", prefix, l))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runs the weather round trip. Returns the process exit code: 0 when the
/// model behaved, 1 when either answer was surprising.
pub async fn run(host: &str, seed: u64) -> Result<u8, ToolcallError> {
    let client = CompletionClient::new(host);
    let tools = vec![weather_tool()];
    let mut exitcode = 0;

    let mut msgs = vec![Message::User(
        "What's the weather like today in Paris".to_string(),
    )];
    let ret = exec_msgs(&client, seed, &tools, &msgs).await?;
    println!("Got: {:?}", ret);
    let calls: Vec<FunctionCall> = serde_json::from_str(ret.trim())?;
    if calls != expected_calls() {
        println!("Surprising return value");
        exitcode = 1;
    }

    append_tool_results(&mut msgs, &calls)?;

    let ret = exec_msgs(&client, seed, &tools, &msgs).await?;
    println!("Got: {:?}", ret);
    if !ret.contains(" 43 ") {
        exitcode = 1;
    }
    Ok(exitcode)
}
