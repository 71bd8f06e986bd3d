//! Inference pipelines.
//!
//! A pipeline is a handle to an external engine plus the preset it serves.
//! The servers build one at startup and call it for every request, one
//! request at a time.

pub mod image;
pub mod presets;
pub mod preview;
pub mod text;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;

pub use image::RemoteDiffusion;
pub use presets::{ImageModel, TextModel, DEFAULT_NEGATIVE_PROMPT};
pub use preview::Preview;
pub use text::{LlamaServer, Ollama};

/// Parameters for a single text-to-image call.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub seed: u64,
    pub guidance_scale: f32,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait ImagePipeline: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the PNG encoded image.
    async fn generate(&self, req: &ImageRequest) -> PipelineResult<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Parameters for a single greedy chat completion.
#[derive(Debug, Clone)]
pub struct TextRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[async_trait]
pub trait TextPipeline: Send + Sync {
    fn name(&self) -> &str;

    /// Returns only the generated text, never the prompt.
    async fn complete(&self, req: &TextRequest) -> PipelineResult<String>;
}
