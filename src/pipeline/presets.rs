use clap::ValueEnum;

/// Negative prompt sent with every image request.
pub const DEFAULT_NEGATIVE_PROMPT: &str = "out of frame, lowers, text, error, cropped, worst quality, low quality, jpeg artifacts, ugly, duplicate, morbid, mutilated, out of frame, extra fingers, mutated hands, poorly drawn hands, poorly drawn face, mutation, deformed, blurry, dehydrated, bad anatomy, bad proportions, extra limbs, cloned face";

/// Diffusion checkpoints the image server knows how to ask for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ImageModel {
    /// Stable Diffusion 3 Medium. Gated on Hugging Face, needs `--token`.
    #[value(name = "sd3-medium")]
    Sd3Medium,
    /// SDXL base 1.0 with the LCM LoRA.
    SdxlLcmLora,
    /// Segmind SSD-1B with the LCM LoRA.
    #[default]
    #[value(name = "ssd-1b-lcm-lora")]
    Ssd1bLcmLora,
}

impl ImageModel {
    pub fn repo(&self) -> &'static str {
        match self {
            ImageModel::Sd3Medium => "stabilityai/stable-diffusion-3-medium-diffusers",
            ImageModel::SdxlLcmLora => "stabilityai/stable-diffusion-xl-base-1.0",
            ImageModel::Ssd1bLcmLora => "segmind/SSD-1B",
        }
    }

    pub fn lora(&self) -> Option<&'static str> {
        match self {
            ImageModel::Sd3Medium => None,
            ImageModel::SdxlLcmLora => Some("latent-consistency/lcm-lora-sdxl"),
            ImageModel::Ssd1bLcmLora => Some("latent-consistency/lcm-lora-ssd-1b"),
        }
    }

    /// LCM adapters want no classifier-free guidance.
    pub fn guidance_scale(&self) -> f32 {
        if self.lora().is_some() { 1.0 } else { 7.0 }
    }

    pub fn requires_token(&self) -> bool {
        matches!(self, ImageModel::Sd3Medium)
    }
}

/// Instruction-tuned LLMs the text server knows how to ask for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TextModel {
    #[default]
    #[value(name = "llama-3.2-3b")]
    Llama32_3b,
    #[value(name = "phi-3-mini")]
    Phi3Mini,
    #[value(name = "phi-3-medium")]
    Phi3Medium,
    MistralNemo,
}

impl TextModel {
    pub fn repo(&self) -> &'static str {
        match self {
            TextModel::Llama32_3b => "meta-llama/Llama-3.2-3B-Instruct",
            TextModel::Phi3Mini => "microsoft/Phi-3-mini-4k-instruct",
            TextModel::Phi3Medium => "microsoft/Phi-3-medium-128k-instruct",
            TextModel::MistralNemo => "mistralai/Mistral-Nemo-Instruct-2407",
        }
    }
}
