pub mod chat;
pub mod generate;
pub mod health;
pub mod quit;

pub use chat::{chat_completions, ChatCompletionRequest, ChatCompletionResponse};
pub use generate::{generate_image, GenerateRequest, GenerateResponse};
pub use health::{health_check, HealthResponse};
pub use quit::{quit, unknown_path, QuitResponse};
