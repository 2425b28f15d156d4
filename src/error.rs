use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error taxonomy. Every variant carries a stable kind
/// string (see [`AppError::kind`]) and a human-readable message.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{0}")]
    Upstream(String),
    #[error("completion request timed out after {0} seconds")]
    UpstreamTimeout(u64),
    #[error("cannot reach completion service: {0}")]
    UpstreamUnreachable(String),
    #[error("malformed completion response: {0}")]
    UpstreamProtocol(String),
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidState(_) => "invalid_state",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Configuration(_) => "configuration_error",
            AppError::Upstream(_) => "upstream_error",
            AppError::UpstreamTimeout(_) => "upstream_timeout",
            AppError::UpstreamUnreachable(_) => "upstream_unreachable",
            AppError::UpstreamProtocol(_) => "upstream_protocol_error",
            AppError::Database(_) => "database_error",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            // The original API surfaced duplicate registrations as 400.
            AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidState(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            AppError::UpstreamProtocol(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}: {}", self.kind(), self);
        }
        let body = json!({
            "error": self.kind(),
            "detail": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
