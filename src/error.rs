use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use thiserror::Error;

use crate::analytics_client::AnalyticsError;
use crate::planners::PlannerError;
use crate::sql::error::TranslatorError;

/// API Error types for consistent error handling
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Upstream analytics error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::RateLimitExceeded(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            ApiError::Upstream(msg) => (StatusCode::INTERNAL_SERVER_ERROR, format!("Upstream error: {msg}")),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, format!("Validation error: {msg}")),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalServerError(err.to_string())
    }
}

impl From<clickhouse::error::Error> for ApiError {
    fn from(err: clickhouse::error::Error) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

/// Translation/composition errors are never retried and always surface as
/// 4xx at the transport (SPEC_FULL.md §7) — except an upstream client
/// failure wrapped inside a `TranslatorError::Upstream`, which is 5xx.
impl From<TranslatorError> for ApiError {
    fn from(err: TranslatorError) -> Self {
        match err {
            TranslatorError::Upstream(msg) => ApiError::Upstream(msg),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl From<PlannerError> for ApiError {
    fn from(err: PlannerError) -> Self {
        match err {
            PlannerError::Translator(e) => e.into(),
            PlannerError::Analytics(e) => e.into(),
        }
    }
}
