//! Command line and environment configuration.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::pipeline::image::DIFFUSION_DEFAULT_URL;
use crate::pipeline::text::{LLAMA_CPP_DEFAULT_URL, OLLAMA_DEFAULT_URL};
use crate::pipeline::{ImageModel, TextModel};

#[derive(Debug, Parser)]
#[command(name = "inference-host", version, about = "Local image and text inference servers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serves text-to-image generation on /api/generate.
    Image(ImageArgs),
    /// Serves OpenAI-style chat completions on /v1/chat/completions.
    Llm(LlmArgs),
    /// Checks Mistral v3 tool calling against a running llama-server.
    ToolcallProbe(ProbeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ListenArgs {
    /// Host to listen to. Use 0.0.0.0 to listen on all IPs.
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Hugging Face read token, forwarded to the engine as a bearer token.
    /// Create one at https://huggingface.co/settings/tokens
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageBackend {
    /// AUTOMATIC1111-compatible txt2img API.
    Automatic1111,
    /// Deterministic placeholder pictures, no model involved.
    Preview,
}

#[derive(Debug, Clone, Args)]
pub struct ImageArgs {
    #[command(flatten)]
    pub listen: ListenArgs,

    #[arg(long, default_value_t = 8032)]
    pub port: u16,

    #[arg(long, value_enum, default_value_t = ImageModel::default())]
    pub model: ImageModel,

    #[arg(long, value_enum, default_value_t = ImageBackend::Automatic1111)]
    pub backend: ImageBackend,

    /// Base URL of the diffusion engine.
    #[arg(long, env = "DIFFUSION_URL", default_value = DIFFUSION_DEFAULT_URL)]
    pub upstream: String,

    #[arg(long, default_value_t = 1024)]
    pub width: u32,

    #[arg(long, default_value_t = 1024)]
    pub height: u32,

    /// Overrides the preset's guidance scale.
    #[arg(long)]
    pub guidance_scale: Option<f32>,

    /// Also writes every generated PNG into this directory.
    #[arg(long)]
    pub save_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TextBackend {
    /// llama.cpp llama-server.
    LlamaServer,
    Ollama,
}

#[derive(Debug, Clone, Args)]
pub struct LlmArgs {
    #[command(flatten)]
    pub listen: ListenArgs,

    #[arg(long, default_value_t = 8031)]
    pub port: u16,

    #[arg(long, value_enum, default_value_t = TextModel::default())]
    pub model: TextModel,

    #[arg(long, value_enum, default_value_t = TextBackend::LlamaServer)]
    pub backend: TextBackend,

    /// Base URL of the text engine. Falls back to `LLAMA_CPP_URL` or
    /// `OLLAMA_URL` depending on the backend, then to the engine's usual port.
    #[arg(long)]
    pub upstream: Option<String>,

    /// Model tag to request from Ollama; defaults to the preset's repo id.
    #[arg(long)]
    pub ollama_tag: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ProbeArgs {
    /// llama.cpp server.
    #[arg(long, default_value = "localhost:8080")]
    pub host: String,

    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Enables logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Command {
    /// Log filter used when `RUST_LOG` is unset.
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            Command::Image(_) | Command::Llm(_) => "info",
            Command::ToolcallProbe(args) if args.verbose => "info",
            Command::ToolcallProbe(_) => "error",
        }
    }
}

impl ImageArgs {
    pub fn guidance_scale(&self) -> f32 {
        self.guidance_scale
            .unwrap_or_else(|| self.model.guidance_scale())
    }
}

impl TextBackend {
    pub fn url_env(&self) -> &'static str {
        match self {
            TextBackend::LlamaServer => "LLAMA_CPP_URL",
            TextBackend::Ollama => "OLLAMA_URL",
        }
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            TextBackend::LlamaServer => LLAMA_CPP_DEFAULT_URL,
            TextBackend::Ollama => OLLAMA_DEFAULT_URL,
        }
    }
}

impl LlmArgs {
    pub fn upstream_url(&self) -> String {
        self.resolve_upstream(|key| std::env::var(key).ok())
    }

    fn resolve_upstream(&self, env: impl Fn(&str) -> Option<String>) -> String {
        self.upstream
            .clone()
            .or_else(|| env(self.backend.url_env()).filter(|url| !url.is_empty()))
            .unwrap_or_else(|| self.backend.default_url().to_string())
    }
}
