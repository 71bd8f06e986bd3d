use axum::{extract::State, http::StatusCode, http::Uri, response::IntoResponse, Json};
use serde::Serialize;

use crate::error::ApiError;
use crate::server::Shutdown;

#[derive(Serialize)]
pub struct QuitResponse {
    pub quitting: bool,
}

/// Answers, then lets the serve loop drain and exit.
pub async fn quit(State(shutdown): State<Shutdown>) -> impl IntoResponse {
    tracing::info!("quit requested");
    shutdown.trigger();
    (StatusCode::OK, Json(QuitResponse { quitting: true }))
}

pub async fn unknown_path(uri: Uri) -> ApiError {
    ApiError::UnknownPath(uri.path().to_string())
}
