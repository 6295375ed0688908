//! Error handling for the REST API server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    // Common error constructors
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

// Convert from vault-core errors
impl From<vault_core::VaultError> for ApiError {
    fn from(err: vault_core::VaultError) -> Self {
        use vault_core::VaultError;

        match err {
            VaultError::NotFound { code, .. } => {
                ApiError::new(StatusCode::NOT_FOUND, code.as_str(), "Record not found")
            }
            VaultError::Parse { message, code } => {
                ApiError::new(StatusCode::BAD_REQUEST, code.as_str(), message)
            }
            VaultError::Configuration(msg) => ApiError::bad_request(msg),
            VaultError::Conflict { message } => ApiError::conflict(message),
            VaultError::MalformedVersionLabel { label } => {
                ApiError::internal(format!("Malformed version label: {label}"))
            }
            VaultError::Storage { message, .. } => {
                ApiError::internal(format!("Storage error: {message}"))
            }
            // Cache failures degrade inside the core and should never
            // reach a handler; treat a leak as internal.
            VaultError::CacheUnavailable { message } => {
                ApiError::internal(format!("Cache error: {message}"))
            }
            VaultError::Serialization(e) => {
                ApiError::internal(format!("Serialization error: {e}"))
            }
            VaultError::Io(e) => ApiError::internal(format!("IO error: {e}")),
            VaultError::Internal(msg) => ApiError::internal(msg),
        }
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let err: ApiError = vault_core::VaultError::record_not_found("rec-1").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "REC_001");
        assert_eq!(err.message, "Record not found");
    }

    #[test]
    fn test_parse_maps_to_400() {
        let err: ApiError = vault_core::VaultError::parse_timestamp("bad input").into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_conflict_maps_to_409_with_message() {
        let err: ApiError =
            vault_core::VaultError::conflict("version set changed between scan and apply").into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert!(err.message.contains("version set changed"));
    }

    #[test]
    fn test_storage_maps_to_500() {
        let err: ApiError = vault_core::VaultError::storage("disk full").into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("disk full"));
    }
}
