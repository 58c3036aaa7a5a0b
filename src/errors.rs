use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};

/// Error body returned to HTTP callers.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Unified error type for all service operations.
///
/// Every variant maps to a distinct, stable HTTP status via `status_code()`
/// so callers can tell "fix your input" from "retry later" from "forged".
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Unsupported gateway: {0}")]
    UnsupportedGateway(String),

    /// Provider/carrier-side failure (network, timeout, rejected request).
    /// Wraps the underlying cause; never retried by the core itself.
    #[error("Gateway error: {0}")]
    GatewayError(#[from] anyhow::Error),

    #[error("Invalid signature")]
    SignatureError,

    #[error("Invalid callback: {0}")]
    InvalidCallback(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Wraps an arbitrary gateway failure with context.
    pub fn gateway(context: &str, err: impl Into<anyhow::Error>) -> Self {
        ServiceError::GatewayError(err.into().context(context.to_string()))
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidCallback(_) | Self::UnsupportedGateway(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidOperation(_) => StatusCode::CONFLICT,
            Self::InsufficientStock(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::SignatureError => StatusCode::FORBIDDEN,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            Self::GatewayError(_) => "Upstream gateway error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_distinct_statuses() {
        assert_eq!(
            ServiceError::NotFound("cart".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ValidationError("qty".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InvalidOperation("already paid".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::UnsupportedGateway("paypal".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::SignatureError.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::gateway("carrier unreachable", std::io::Error::other("timeout"))
                .status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn gateway_error_hides_cause_from_responses() {
        let err = ServiceError::gateway("nova poshta", std::io::Error::other("secret detail"));
        assert!(!err.response_message().contains("secret detail"));
        // The cause stays available for logs.
        assert!(format!("{err}").contains("nova poshta"));
    }
}
