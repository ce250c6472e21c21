//! Error handling for the care plan API
//!
//! Every failure is rendered as
//! `{"error": .., "errorDetails": {"errorCode": .., "errorMessage": ..}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use careplan_content_store::BlobStoreError;
use careplan_core::PlanError;
use serde_json::json;
use tracing::error;

use crate::error::ServerError;

/// API Error type for returning standard error responses
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),
    /// Unauthorized (401)
    Unauthorized(String),
    /// Forbidden (403)
    Forbidden(String),
    /// Not found (404)
    NotFound(String),
    /// Wrapped server error
    ServerError(ServerError),
}

impl From<ServerError> for ApiError {
    fn from(err: ServerError) -> Self {
        ApiError::ServerError(err)
    }
}

impl From<PlanError> for ApiError {
    fn from(err: PlanError) -> Self {
        ApiError::ServerError(ServerError::Plan(err))
    }
}

impl From<BlobStoreError> for ApiError {
    fn from(err: BlobStoreError) -> Self {
        ApiError::ServerError(ServerError::BlobStore(err))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::ServerError(err) => write!(f, "Server Error: {}", err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "ERR_BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "ERR_UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "ERR_FORBIDDEN", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "ERR_NOT_FOUND", msg),
            ApiError::ServerError(err) => return api_error_response(&err),
        };

        error_body(status, error_code, &message)
    }
}

fn error_body(status: StatusCode, error_code: &str, message: &str) -> Response {
    let body = Json(json!({
        "error": message,
        "errorDetails": {
            "errorCode": error_code,
            "errorMessage": message,
        }
    }));

    (status, body).into_response()
}

/// Status and error code for a server error
pub fn classify(err: &ServerError) -> (StatusCode, &'static str) {
    match err {
        ServerError::Plan(PlanError::Validation(_)) => {
            (StatusCode::BAD_REQUEST, "ERR_VALIDATION_ERROR")
        }
        ServerError::Plan(PlanError::MalformedDocument(_)) => {
            (StatusCode::BAD_REQUEST, "ERR_MALFORMED_DOCUMENT")
        }
        ServerError::Plan(PlanError::CorruptRecord(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "ERR_CORRUPT_RECORD")
        }
        ServerError::Plan(PlanError::StorageUnavailable(_)) => {
            (StatusCode::SERVICE_UNAVAILABLE, "ERR_STORAGE_UNAVAILABLE")
        }
        ServerError::Plan(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ERR_INTERNAL_SERVER_ERROR"),
        ServerError::BlobStore(BlobStoreError::InvalidName(_)) => {
            (StatusCode::BAD_REQUEST, "ERR_INVALID_ATTACHMENT_NAME")
        }
        ServerError::BlobStore(BlobStoreError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, "ERR_NOT_FOUND_ATTACHMENT")
        }
        ServerError::BlobStore(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ERR_ATTACHMENT_STORE_ERROR"),
        ServerError::ConfigurationError(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "ERR_CONFIGURATION_ERROR")
        }
        ServerError::Io(_) | ServerError::InternalError(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "ERR_INTERNAL_SERVER_ERROR")
        }
    }
}

/// Convert a server error into a standardized API error response
pub fn api_error_response(err: &ServerError) -> Response {
    let (status, error_code) = classify(err);

    if status.is_server_error() {
        error!(error = %err, error_code, "Request failed");
    }

    error_body(status, error_code, &err.to_string())
}
