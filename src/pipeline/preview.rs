use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io::Cursor;

use super::{ImagePipeline, ImageRequest};
use crate::error::PipelineResult;

/// Renders a deterministic placeholder instead of running a model.
///
/// The picture is a gradient between two colours picked from the prompt and
/// seed, overlaid with `steps` discs. Same `(prompt, seed, steps)` gives the
/// same bytes, which lets clients be exercised without an accelerator.
pub struct Preview;

#[async_trait]
impl ImagePipeline for Preview {
    fn name(&self) -> &str {
        "preview"
    }

    async fn generate(&self, req: &ImageRequest) -> PipelineResult<Vec<u8>> {
        render(req)
    }
}

fn render(req: &ImageRequest) -> PipelineResult<Vec<u8>> {
    let width = req.width.max(1);
    let height = req.height.max(1);
    let mut rng = ChaCha8Rng::seed_from_u64(req.seed ^ prompt_hash(&req.prompt));

    let from: [u8; 3] = rng.random();
    let to: [u8; 3] = rng.random();
    let mut img = RgbImage::from_fn(width, height, |x, y| {
        let t = (x + y) as f32 / (width + height) as f32;
        Rgb([
            lerp(from[0], to[0], t),
            lerp(from[1], to[1], t),
            lerp(from[2], to[2], t),
        ])
    });

    let max_radius = (width.min(height) / 6).max(1) as i64;
    for _ in 0..req.steps.min(64) {
        let cx = rng.random_range(0..width) as i64;
        let cy = rng.random_range(0..height) as i64;
        let r = rng.random_range(1..=max_radius);
        let color = Rgb(rng.random::<[u8; 3]>());
        for y in (cy - r).max(0)..(cy + r).min(height as i64) {
            for x in (cx - r).max(0)..(cx + r).min(width as i64) {
                if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
                    img.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

fn lerp(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round() as u8
}

/// FNV-1a, stable across builds so the same prompt always picks the same stream.
fn prompt_hash(prompt: &str) -> u64 {
    prompt.bytes().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
    })
}
