//! Unified API error handling
//!
//! Every layer (repository, generation pipeline, export, handlers) reports
//! failures through [`ApiError`], which maps each kind onto an HTTP status and
//! a consistent JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A workflow stage was invoked before the stage it depends on.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Context too large: estimated {token_estimate} tokens exceeds budget of {budget}")]
    ContextTooLarge { token_estimate: usize, budget: usize },

    #[error("No RFT document text available for requirement extraction")]
    NoSourceText,

    #[error("No content: {0}")]
    NoContent(String),

    #[error("Invalid editor action: {0}")]
    InvalidAction(String),

    #[error("Rate limited by model provider, retry in {retry_delay_seconds}s")]
    RateLimited { retry_delay_seconds: u64 },

    #[error("Generation failed: {0}")]
    Upstream(String),

    #[error("Storage error")]
    Storage(#[source] anyhow::Error),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(rename = "tokenCount", skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,
    #[serde(rename = "isRateLimitError", skip_serializing_if = "Option::is_none")]
    pub is_rate_limit_error: Option<bool>,
    #[serde(rename = "retryDelaySeconds", skip_serializing_if = "Option::is_none")]
    pub retry_delay_seconds: Option<u64>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            request_id: None,
            token_count: None,
            is_rate_limit_error: None,
            retry_delay_seconds: None,
        }
    }
}

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn storage(err: impl Into<anyhow::Error>) -> Self {
        Self::Storage(err.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_)
            | Self::Precondition(_)
            | Self::ContextTooLarge { .. }
            | Self::NoSourceText
            | Self::NoContent(_)
            | Self::InvalidAction(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream(_) | Self::Storage(_) | Self::Internal(_) | Self::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "VALIDATION_ERROR",
            Self::Precondition(_) => "PRECONDITION_FAILED",
            Self::ContextTooLarge { .. } => "CONTEXT_TOO_LARGE",
            Self::NoSourceText => "NO_SOURCE_TEXT",
            Self::NoContent(_) => "NO_CONTENT",
            Self::InvalidAction(_) => "INVALID_ACTION",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Upstream(_) => "GENERATION_FAILED",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Unauthorized(msg)
            | Self::NotFound(msg)
            | Self::BadRequest(msg)
            | Self::Precondition(msg)
            | Self::NoContent(msg) => msg.clone(),
            Self::ContextTooLarge { .. }
            | Self::NoSourceText
            | Self::InvalidAction(_)
            | Self::RateLimited { .. } => self.to_string(),
            Self::Upstream(_) => "Content generation failed".to_string(),
            Self::Storage(_) => "A storage error occurred".to_string(),
            // Don't leak internal error details
            Self::Internal(_) | Self::Database(_) => "An internal error occurred".to_string(),
        }
    }

    fn to_body(&self) -> ErrorResponse {
        let mut body = ErrorResponse::new(self.error_code(), self.public_message());
        match self {
            Self::ContextTooLarge { token_estimate, .. } => {
                body.token_count = Some(*token_estimate);
            }
            Self::RateLimited {
                retry_delay_seconds,
            } => {
                body.is_rate_limit_error = Some(true);
                body.retry_delay_seconds = Some(*retry_delay_seconds);
            }
            _ => {}
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(e) => tracing::error!(error = ?e, "Internal server error"),
            Self::Database(e) => tracing::error!(error = ?e, "Database error"),
            Self::Storage(e) => tracing::error!(error = ?e, "Storage error"),
            Self::Upstream(e) => tracing::error!(error = %e, "Generation failed"),
            _ => tracing::warn!(error = %self, "API error"),
        }

        let status = self.status_code();
        let body = self.to_body();

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
