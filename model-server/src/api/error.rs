use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::selector::InvalidLabel;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed or undecodable client input
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// A referenced date or epoch does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Checkpoint storage is missing or unreadable
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The predictor did not answer in time
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<InvalidLabel> for ApiError {
    fn from(e: InvalidLabel) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::StorageUnavailable { .. } => ApiError::StorageUnavailable(e.to_string()),
            CatalogError::NotFound(what) => ApiError::NotFound(what),
            CatalogError::InvalidLabel(label) => label.into(),
            CatalogError::NonNumericEpoch { .. } => ApiError::NotFound(e.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::StorageUnavailable(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Convert ApiError into HTTP response
///
/// Body: `{"error": "<reason phrase>", "error_description": "<detail>"}`.
/// Server-side causes are logged and replaced with a generic description.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let description = match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => msg,
            ApiError::StorageUnavailable(msg) => {
                tracing::error!(error = %msg, "Checkpoint storage unavailable");
                "checkpoint storage unavailable".to_string()
            }
            ApiError::ServiceUnavailable(msg) => {
                tracing::warn!(error = %msg, "Service unavailable");
                "predictor unavailable, try again later".to_string()
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "error_description": description,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
