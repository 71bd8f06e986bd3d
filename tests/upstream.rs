//! Backends driven against throwaway local engines.

use axum::{
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use inference_host::pipeline::{
    ChatMessage, ImageModel, ImagePipeline, ImageRequest, LlamaServer, Ollama, Preview,
    RemoteDiffusion, TextModel, TextPipeline, TextRequest, DEFAULT_NEGATIVE_PROMPT,
};
use inference_host::PipelineError;

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{}", addr)
}

fn image_request() -> ImageRequest {
    ImageRequest {
        prompt: "a red fox".to_string(),
        negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
        steps: 4,
        seed: 42,
        guidance_scale: 1.0,
        width: 16,
        height: 16,
    }
}

fn text_request() -> TextRequest {
    TextRequest {
        messages: vec![ChatMessage::new("user", "Say hi")],
        max_tokens: 33,
    }
}

#[tokio::test]
async fn txt2img_round_trip() {
    let png = Preview.generate(&image_request()).await.unwrap();
    let encoded = STANDARD.encode(&png);

    let app = Router::new().route(
        "/sdapi/v1/txt2img",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let encoded = encoded.clone();
            async move {
                assert_eq!(headers["authorization"], "Bearer hf_secret");
                assert_eq!(body["prompt"], "a red fox <lora:lcm-lora-ssd-1b:1>");
                assert_eq!(body["steps"], 4);
                assert_eq!(body["seed"], 42);
                assert_eq!(body["cfg_scale"], 1.0);
                assert_eq!(body["override_settings"]["sd_model_checkpoint"], "segmind/SSD-1B");
                Json(json!({"images": [encoded], "info": "{}"}))
            }
        }),
    );
    let url = spawn(app).await;

    let pipe = RemoteDiffusion::new(url, ImageModel::Ssd1bLcmLora, Some("hf_secret".to_string()));
    let out = pipe.generate(&image_request()).await.unwrap();
    let img = image::load_from_memory(&out).unwrap();
    assert_eq!((img.width(), img.height()), (16, 16));
}

#[tokio::test]
async fn txt2img_errors() {
    let app = Router::new()
        .route(
            "/sdapi/v1/txt2img",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "CUDA out of memory") }),
        );
    let url = spawn(app).await;
    let pipe = RemoteDiffusion::new(url, ImageModel::Sd3Medium, None);
    match pipe.generate(&image_request()).await {
        Err(PipelineError::Upstream { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "CUDA out of memory");
        }
        other => panic!("unexpected {:?}", other.map(|b| b.len())),
    }

    let app = Router::new().route(
        "/sdapi/v1/txt2img",
        post(|| async { Json(json!({"images": []})) }),
    );
    let url = spawn(app).await;
    let pipe = RemoteDiffusion::new(url, ImageModel::Sd3Medium, None);
    assert!(matches!(
        pipe.generate(&image_request()).await,
        Err(PipelineError::Malformed(_))
    ));
}

#[tokio::test]
async fn llama_server_completion() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["model"], "microsoft/Phi-3-mini-4k-instruct");
            assert_eq!(body["max_tokens"], 33);
            assert_eq!(body["temperature"], 0.0);
            assert_eq!(body["stream"], false);
            assert_eq!(body["messages"][0]["content"], "Say hi");
            Json(json!({
                "id": "x",
                "object": "chat.completion",
                "choices": [{
                    "index": 0,
                    "finish_reason": "stop",
                    "message": {"role": "assistant", "content": "hi"},
                }],
            }))
        }),
    );
    let url = spawn(app).await;

    let pipe = LlamaServer::new(url, TextModel::Phi3Mini, None);
    assert_eq!(pipe.name(), "microsoft/Phi-3-mini-4k-instruct");
    assert_eq!(pipe.complete(&text_request()).await.unwrap(), "hi");
}

#[tokio::test]
async fn llama_server_empty_choices() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async { Json(json!({"choices": []})) }),
    );
    let url = spawn(app).await;
    let pipe = LlamaServer::new(url, TextModel::default(), None);
    assert!(matches!(
        pipe.complete(&text_request()).await,
        Err(PipelineError::Malformed(_))
    ));
}

#[tokio::test]
async fn ollama_chat() {
    let app = Router::new().route(
        "/api/chat",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["model"], "llama3.2:3b");
            assert_eq!(body["options"]["num_predict"], 33);
            assert_eq!(body["stream"], false);
            Json(json!({
                "model": "llama3.2:3b",
                "message": {"role": "assistant", "content": "hello there"},
                "done": true,
            }))
        }),
    );
    let url = spawn(app).await;

    let pipe = Ollama::new(url, TextModel::Llama32_3b, Some("llama3.2:3b".to_string()));
    assert_eq!(pipe.complete(&text_request()).await.unwrap(), "hello there");
}

#[tokio::test]
async fn unreachable_engine_is_transport_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let pipe = LlamaServer::new(format!("http://{}", addr), TextModel::default(), None);
    assert!(matches!(
        pipe.complete(&text_request()).await,
        Err(PipelineError::Transport(_))
    ));
}
