pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod toolcall;
pub mod v1;

pub use error::{ApiError, PipelineError};
pub use server::{chat_router, image_router, serve, ChatState, ImageDefaults, ImageState, Shutdown};
