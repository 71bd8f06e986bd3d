use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, TextModel, TextPipeline, TextRequest};
use crate::error::{PipelineError, PipelineResult};

pub const LLAMA_CPP_DEFAULT_URL: &str = "http://localhost:8080";
pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

#[derive(Serialize)]
struct OpenAIChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIChatCompletionResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: ChatMessage,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

async fn post_json<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    token: Option<&str>,
    body: &B,
) -> PipelineResult<reqwest::Response> {
    let mut request = client.post(url).json(body);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let response = request.send().await?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(PipelineError::Upstream { status, body });
    }
    Ok(response)
}

/// Chat completions from a llama.cpp `llama-server`.
pub struct LlamaServer {
    client: reqwest::Client,
    base_url: String,
    model: TextModel,
    token: Option<String>,
}

impl LlamaServer {
    pub fn new(base_url: impl Into<String>, model: TextModel, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
            token,
        }
    }
}

#[async_trait]
impl TextPipeline for LlamaServer {
    fn name(&self) -> &str {
        self.model.repo()
    }

    async fn complete(&self, req: &TextRequest) -> PipelineResult<String> {
        let body = OpenAIChatCompletionRequest {
            model: self.model.repo(),
            messages: &req.messages,
            max_tokens: req.max_tokens,
            temperature: 0.0,
            stream: false,
        };
        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = post_json(&self.client, &url, self.token.as_deref(), &body).await?;
        let reply: OpenAIChatCompletionResponse = response.json().await?;
        reply
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| PipelineError::Malformed("no choices in completion".to_string()))
    }
}

/// Chat completions from an Ollama daemon.
pub struct Ollama {
    client: reqwest::Client,
    base_url: String,
    model: TextModel,
    tag: String,
}

impl Ollama {
    /// Ollama names models by its own tags, so the tag defaults to the repo id
    /// and can be overridden.
    pub fn new(base_url: impl Into<String>, model: TextModel, tag: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
            tag: tag.unwrap_or_else(|| model.repo().to_string()),
        }
    }
}

#[async_trait]
impl TextPipeline for Ollama {
    fn name(&self) -> &str {
        self.model.repo()
    }

    async fn complete(&self, req: &TextRequest) -> PipelineResult<String> {
        let body = OllamaChatRequest {
            model: &self.tag,
            messages: &req.messages,
            stream: false,
            options: OllamaOptions {
                num_predict: req.max_tokens,
                temperature: 0.0,
            },
        };
        let url = format!("{}/api/chat", self.base_url);
        let response = post_json(&self.client, &url, None, &body).await?;
        let reply: OllamaChatResponse = response.json().await?;
        Ok(reply.message.content)
    }
}
