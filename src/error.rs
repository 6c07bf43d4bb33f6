use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Every way a Link Service operation can fail.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("target_url must be an absolute http or https URL")]
    InvalidTargetUrl,
    #[error("custom code must match [A-Za-z0-9]{{6,8}}")]
    InvalidFormat,
    #[error("code '{0}' already exists")]
    Conflict(String),
    #[error("link not found")]
    NotFound,
    #[error("could not generate a unique code after {0} attempts")]
    AllocationExhausted(usize),
    #[error("stored target URL cannot be used as a redirect: {0}")]
    UnusableTarget(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl LinkError {
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Build a JSON error response with a short human-readable message.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for LinkError {
    fn into_response(self) -> Response {
        let status = match &self {
            LinkError::InvalidTargetUrl | LinkError::InvalidFormat => StatusCode::BAD_REQUEST,
            LinkError::Conflict(_) => StatusCode::CONFLICT,
            LinkError::NotFound => StatusCode::NOT_FOUND,
            LinkError::AllocationExhausted(attempts) => {
                tracing::warn!(attempts, "Short code space looks congested");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            LinkError::UnusableTarget(target_url) => {
                tracing::error!(target_url = %target_url, "Stored target URL is not a valid Location header");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
            LinkError::Database(e) => {
                tracing::error!(error = ?e, "Unexpected database error");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        };

        error_response(status, self.to_string())
    }
}
