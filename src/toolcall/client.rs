use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolcallError {
    #[error("cannot reach llama-server: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("llama-server error: {0}")]
    Server(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown tool {0:?}")]
    UnknownTool(String),
}

impl ToolcallError {
    pub fn is_connect(&self) -> bool {
        matches!(self, ToolcallError::Transport(e) if e.is_connect())
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    grammar: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Completion {
    pub content: String,
    #[serde(default)]
    pub model: String,
}

/// Raw prompt completion against llama-server's `/completion`.
pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
}

impl CompletionClient {
    /// `host` is `host:port`, as passed on the command line.
    pub fn new(host: &str) -> Self {
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", host.trim_end_matches('/'))
        };
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn complete(
        &self,
        prompt: &str,
        grammar: Option<&str>,
        seed: Option<u64>,
    ) -> Result<Completion, ToolcallError> {
        let body = CompletionRequest {
            prompt,
            grammar: grammar.filter(|g| !g.is_empty()),
            seed,
        };
        tracing::debug!(request = %serde_json::to_string(&body)?, "raw request");

        let response = self
            .client
            .post(format!("{}/completion", self.base_url))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let reply: Value = response.json().await?;
        tracing::debug!(%status, reply = %reply, "raw reply");

        if let Some(err) = reply.get("error").filter(|e| !e.is_null()) {
            return Err(ToolcallError::Server(err.to_string()));
        }
        if !status.is_success() {
            return Err(ToolcallError::Server(format!("HTTP {}", status)));
        }
        Ok(serde_json::from_value(reply)?)
    }
}
