use async_stream::stream;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::sse::{Event, Sse},
    response::{IntoResponse, Response},
    Json,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Instant;

use crate::error::ApiError;
use crate::pipeline::{ChatMessage, TextRequest};
use crate::server::ChatState;

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub model: Option<String>,
}

fn default_max_tokens() -> u32 {
    500
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    pub finish_reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Delta {
    pub content: String,
}

impl ChatCompletionRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.messages.is_empty() {
            return Err(ApiError::InvalidRequest("messages array is empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(ApiError::InvalidRequest("max_tokens must be at least 1".to_string()));
        }
        Ok(())
    }
}

pub async fn chat_completions(
    State(state): State<ChatState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req: ChatCompletionRequest = serde_json::from_slice(&body)?;
    req.validate()?;

    let start = Instant::now();
    let text_req = TextRequest {
        messages: req.messages,
        max_tokens: req.max_tokens,
    };

    let (model, output) = {
        let pipeline = state.pipeline.lock().await;
        let output = pipeline.complete(&text_req).await?;
        (req.model.unwrap_or_else(|| pipeline.name().to_string()), output)
    };

    tracing::info!(
        prompt = ?text_req.messages.last().map(|m| m.content.as_str()),
        output = %output,
        elapsed = %format!("{:.1}s", start.elapsed().as_secs_f64()),
        "generated text"
    );

    let id = format!("chatcmpl-{}", uuid::Uuid::new_v4().simple());
    let created = chrono::Utc::now().timestamp();

    if req.stream {
        let chunk = ChatCompletionResponse {
            id,
            object: "chat.completion.chunk".to_string(),
            created,
            model,
            choices: vec![Choice {
                index: 0,
                message: None,
                delta: Some(Delta { content: output }),
                finish_reason: "stop".to_string(),
            }],
        };
        return Ok(Sse::new(single_chunk_events(chunk)).into_response());
    }

    let response = ChatCompletionResponse {
        id,
        object: "chat.completion".to_string(),
        created,
        model,
        choices: vec![Choice {
            index: 0,
            message: Some(ChatMessage::new("assistant", output)),
            delta: None,
            finish_reason: "stop".to_string(),
        }],
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// The whole completion as one SSE chunk, then the `[DONE]` sentinel.
fn single_chunk_events(
    chunk: ChatCompletionResponse,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream! {
        match Event::default().json_data(&chunk) {
            Ok(event) => {
                yield Ok(event);
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot serialize chunk");
            }
        }
        yield Ok(Event::default().data("[DONE]"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_validation() {
        let req: ChatCompletionRequest =
            serde_json::from_str(r#"{"messages":[{"role":"user","content":"hi"}]}"#).unwrap();
        assert_eq!(req.max_tokens, 500);
        assert!(!req.stream);
        assert!(req.validate().is_ok());

        let req: ChatCompletionRequest = serde_json::from_str(r#"{"messages":[]}"#).unwrap();
        assert!(req.validate().is_err());

        let req: ChatCompletionRequest = serde_json::from_str(
            r#"{"messages":[{"role":"user","content":"hi"}],"max_tokens":0}"#,
        )
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn whole_response_omits_delta() {
        let response = ChatCompletionResponse {
            id: "chatcmpl-1".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: "m".to_string(),
            choices: vec![Choice {
                index: 0,
                message: Some(ChatMessage::new("assistant", "hello")),
                delta: None,
                finish_reason: "stop".to_string(),
            }],
        };
        let v = serde_json::to_value(&response).unwrap();
        assert_eq!(v["choices"][0]["message"]["content"], "hello");
        assert_eq!(v["choices"][0]["finish_reason"], "stop");
        assert!(v["choices"][0].get("delta").is_none());
    }
}
