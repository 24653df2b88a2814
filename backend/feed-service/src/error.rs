use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Posting limiter rejection. Not a failure, rendered as 429.
    #[error("{message}")]
    RateLimited { message: String, wait_time_secs: u64 },

    /// Content store or follow graph failed or timed out.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitedResponse {
    pub message: String,
    pub wait_time: u64,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();

        if let AppError::RateLimited {
            message,
            wait_time_secs,
        } = self
        {
            return HttpResponse::build(code)
                .insert_header(("Retry-After", wait_time_secs.to_string()))
                .json(RateLimitedResponse {
                    message: message.clone(),
                    wait_time: *wait_time_secs,
                });
        }

        let message = match self {
            AppError::NotFound(msg)
            | AppError::ValidationError(msg)
            | AppError::Authentication(msg) => msg.clone(),
            AppError::UpstreamUnavailable(_) => "Feed temporarily unavailable".to_string(),
            _ => "Internal server error".to_string(),
        };

        HttpResponse::build(code).json(ErrorResponse {
            error: message,
            code: code.as_u16(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Cache(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        AppError::UpstreamUnavailable("upstream request timed out".to_string())
    }
}
