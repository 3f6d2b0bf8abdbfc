/// Error types for Geosync Service
///
/// User-visible failures carry a machine-readable status and a human-readable
/// message; ingestion failures are recorded on the entity's sync state instead
/// (the triggering request has already returned by the time they occur).
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

/// Result type for geosync-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed spatial query parameter; the message is part of the API contract
    #[error("{0}")]
    InvalidSpatialParameter(String),

    /// Resource not found (also covers querying an un-synced feature set)
    #[error("Not found")]
    NotFound,

    /// No identity on the request
    #[error("Authentication required")]
    Unauthorized,

    /// Requester is not the resource owner
    #[error("Forbidden")]
    Forbidden,

    /// Bad request with a user-facing message
    #[error("{0}")]
    BadRequest(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Upstream repository host failure
    #[error("Remote service error: {0}")]
    Remote(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidSpatialParameter(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Database(_) | AppError::Remote(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // Internal details stay in the logs, not in responses
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(serde_json::json!({
            "status": "error",
            "message": message,
        }))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<crate::github::GithubError> for AppError {
    fn from(err: crate::github::GithubError) -> Self {
        AppError::Remote(err.to_string())
    }
}
