//! Error types shared by the pipelines and the HTTP handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failure while talking to an inference engine.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("malformed upstream reply: {0}")]
    Malformed(String),

    #[error("invalid base64 image: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Error returned by a route handler, rendered as `{"error": {...}}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    UnknownPath(String),

    #[error("{0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownPath(_) | ApiError::Decode(_) | ApiError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::UnknownPath(_) => "unknown path",
            ApiError::Decode(_) => "decode_error",
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::Pipeline(_) => "exception",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, kind = self.kind(), "rejected request");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_failures_are_server_errors() {
        let err = ApiError::from(PipelineError::Malformed("no images".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind(), "exception");
        assert_eq!(err.to_string(), "malformed upstream reply: no images");
    }

    #[test]
    fn client_errors_are_bad_requests() {
        let err = ApiError::UnknownPath("/nope".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), "unknown path");

        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ApiError::from(decode);
        assert_eq!(err.kind(), "decode_error");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
