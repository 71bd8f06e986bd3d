use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use inference_host::config::{Cli, Command, ImageArgs, ImageBackend, LlmArgs, ProbeArgs, TextBackend};
use inference_host::pipeline::{
    ImagePipeline, LlamaServer, Ollama, Preview, RemoteDiffusion, TextPipeline,
    DEFAULT_NEGATIVE_PROMPT,
};
use inference_host::{chat_router, image_router, serve, ChatState, ImageDefaults, ImageState};

fn init_tracing(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn bind(host: &str, port: u16) -> std::io::Result<tokio::net::TcpListener> {
    tokio::net::TcpListener::bind((host, port)).await
}

async fn run_image(args: ImageArgs) -> std::io::Result<()> {
    if args.model.requires_token() && args.listen.token.is_none() {
        tracing::warn!(model = args.model.repo(), "model is gated, pass --token");
    }
    let pipeline: Box<dyn ImagePipeline> = match args.backend {
        ImageBackend::Automatic1111 => Box::new(RemoteDiffusion::new(
            args.upstream.clone(),
            args.model,
            args.listen.token.clone(),
        )),
        ImageBackend::Preview => Box::new(Preview),
    };
    tracing::info!(pipeline = pipeline.name(), backend = ?args.backend, upstream = %args.upstream, "model selected");

    let defaults = ImageDefaults {
        negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
        guidance_scale: args.guidance_scale(),
        width: args.width,
        height: args.height,
        save_dir: args.save_dir.clone(),
    };
    let state = ImageState::new(pipeline, defaults);
    let shutdown = state.shutdown.clone();

    let listener = bind(&args.listen.host, args.port).await?;
    tracing::info!("Available endpoints:");
    tracing::info!("  - GET  /health       - Health check");
    tracing::info!("  - POST /api/generate - Text to image");
    tracing::info!("  - POST /api/quit     - Stop the server");
    serve(listener, image_router(state), shutdown).await
}

async fn run_llm(args: LlmArgs) -> std::io::Result<()> {
    let upstream = args.upstream_url();
    let pipeline: Box<dyn TextPipeline> = match args.backend {
        TextBackend::LlamaServer => Box::new(LlamaServer::new(
            upstream.clone(),
            args.model,
            args.listen.token.clone(),
        )),
        TextBackend::Ollama => Box::new(Ollama::new(
            upstream.clone(),
            args.model,
            args.ollama_tag.clone(),
        )),
    };
    tracing::info!(pipeline = pipeline.name(), backend = ?args.backend, upstream = %upstream, "model selected");

    let state = ChatState::new(pipeline);
    let shutdown = state.shutdown.clone();

    let listener = bind(&args.listen.host, args.port).await?;
    tracing::info!("Available endpoints:");
    tracing::info!("  - GET  /health              - Health check");
    tracing::info!("  - POST /v1/chat/completions - Chat completion (SSE with stream=true)");
    tracing::info!("  - POST /api/quit            - Stop the server");
    serve(listener, chat_router(state), shutdown).await
}

async fn run_probe(args: ProbeArgs) -> ExitCode {
    match inference_host::toolcall::run(&args.host, args.seed).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            if e.is_connect() {
                eprintln!("\nDid you forget to pass --host?");
            }
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.command.default_log_filter());

    let result = match cli.command {
        Command::Image(args) => run_image(args).await,
        Command::Llm(args) => run_llm(args).await,
        Command::ToolcallProbe(args) => return run_probe(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}
