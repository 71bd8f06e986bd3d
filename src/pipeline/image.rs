use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use super::{ImageModel, ImagePipeline, ImageRequest};
use crate::error::{PipelineError, PipelineResult};

pub const DIFFUSION_DEFAULT_URL: &str = "http://localhost:7860";

#[derive(Serialize)]
struct Txt2ImgRequest<'a> {
    prompt: String,
    negative_prompt: &'a str,
    steps: u32,
    seed: u64,
    cfg_scale: f32,
    width: u32,
    height: u32,
    batch_size: u32,
    override_settings: OverrideSettings<'a>,
}

#[derive(Serialize)]
struct OverrideSettings<'a> {
    sd_model_checkpoint: &'a str,
}

#[derive(Deserialize)]
struct Txt2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
}

/// Diffusion served by an AUTOMATIC1111-compatible `txt2img` endpoint.
pub struct RemoteDiffusion {
    client: reqwest::Client,
    base_url: String,
    model: ImageModel,
    token: Option<String>,
}

impl RemoteDiffusion {
    pub fn new(base_url: impl Into<String>, model: ImageModel, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
            token,
        }
    }

    /// Adapters are requested with the `<lora:name:weight>` prompt syntax.
    fn prompt_for(&self, prompt: &str) -> String {
        match self.model.lora() {
            Some(lora) => {
                let name = lora.rsplit('/').next().unwrap_or(lora);
                format!("{} <lora:{}:1>", prompt, name)
            }
            None => prompt.to_string(),
        }
    }
}

#[async_trait]
impl ImagePipeline for RemoteDiffusion {
    fn name(&self) -> &str {
        self.model.repo()
    }

    async fn generate(&self, req: &ImageRequest) -> PipelineResult<Vec<u8>> {
        let body = Txt2ImgRequest {
            prompt: self.prompt_for(&req.prompt),
            negative_prompt: &req.negative_prompt,
            steps: req.steps,
            seed: req.seed,
            cfg_scale: req.guidance_scale,
            width: req.width,
            height: req.height,
            batch_size: 1,
            override_settings: OverrideSettings {
                sd_model_checkpoint: self.model.repo(),
            },
        };

        let mut request = self
            .client
            .post(format!("{}/sdapi/v1/txt2img", self.base_url))
            .json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Upstream { status, body });
        }

        let reply: Txt2ImgResponse = response.json().await?;
        let encoded = reply
            .images
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::Malformed("no image in txt2img reply".to_string()))?;
        // Some builds prefix a data URL header.
        let encoded = encoded
            .split_once(',')
            .filter(|(head, _)| head.starts_with("data:"))
            .map(|(_, data)| data.to_string())
            .unwrap_or(encoded);
        let raw = STANDARD.decode(encoded.trim())?;
        reencode_png(&raw)
    }
}

/// Decodes any supported image and writes it back out as PNG.
pub fn reencode_png(raw: &[u8]) -> PipelineResult<Vec<u8>> {
    let img = image::load_from_memory(raw)?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)?;
    Ok(out.into_inner())
}
