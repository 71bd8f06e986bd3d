use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::{ApiError, PipelineError};
use crate::pipeline::ImageRequest;
use crate::server::ImageState;

pub const MAX_STEPS: u32 = 150;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub message: String,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_steps() -> u32 {
    4
}

fn default_seed() -> u64 {
    1
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub image: String,
}

impl GenerateRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.message.trim().is_empty() {
            return Err(ApiError::InvalidRequest("message is empty".to_string()));
        }
        if self.steps == 0 || self.steps > MAX_STEPS {
            return Err(ApiError::InvalidRequest(format!(
                "steps must be between 1 and {}, got {}",
                MAX_STEPS, self.steps
            )));
        }
        Ok(())
    }
}

pub async fn generate_image(
    State(state): State<ImageState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: GenerateRequest = serde_json::from_slice(&body)?;
    req.validate()?;

    let start = Instant::now();
    let defaults = &state.defaults;
    let image_req = ImageRequest {
        prompt: req.message.clone(),
        negative_prompt: defaults.negative_prompt.clone(),
        steps: req.steps,
        seed: req.seed,
        guidance_scale: defaults.guidance_scale,
        width: defaults.width,
        height: defaults.height,
    };

    let png = {
        let pipeline = state.pipeline.lock().await;
        tracing::debug!(pipeline = pipeline.name(), steps = req.steps, seed = req.seed, "generating image");
        pipeline.generate(&image_req).await?
    };

    if let Some(dir) = &defaults.save_dir {
        match save_png(dir, &png).await {
            Ok(path) => tracing::debug!(path = %path.display(), "saved image"),
            Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "cannot save image"),
        }
    }

    tracing::info!(
        prompt = %req.message,
        elapsed = %format!("{:.1}s", start.elapsed().as_secs_f64()),
        "generated image"
    );

    let response = GenerateResponse {
        image: STANDARD.encode(&png),
    };
    Ok((StatusCode::OK, Json(response)))
}

/// Writes `png` as `<dir>/<local timestamp>.png`.
pub async fn save_png(dir: &Path, png: &[u8]) -> Result<PathBuf, PipelineError> {
    let name = chrono::Local::now().format("%Y-%m-%dT%H-%M-%S").to_string();
    let path = dir.join(format!("{}.png", name));
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&path, png).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_bot_client() {
        let req: GenerateRequest = serde_json::from_str(r#"{"message":"cat"}"#).unwrap();
        assert_eq!(req.steps, 4);
        assert_eq!(req.seed, 1);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn rejects_empty_prompt_and_bad_steps() {
        let req: GenerateRequest = serde_json::from_str(r#"{"message":"  "}"#).unwrap();
        assert!(matches!(req.validate(), Err(ApiError::InvalidRequest(_))));

        let req: GenerateRequest =
            serde_json::from_str(r#"{"message":"cat","steps":0,"seed":3}"#).unwrap();
        assert!(matches!(req.validate(), Err(ApiError::InvalidRequest(_))));

        let req: GenerateRequest =
            serde_json::from_str(r#"{"message":"cat","steps":151}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn message_is_required() {
        assert!(serde_json::from_str::<GenerateRequest>(r#"{"steps":4}"#).is_err());
    }
}
