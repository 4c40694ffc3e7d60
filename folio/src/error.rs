use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::api::v1::response::ApiResponse;

#[derive(Error, Debug)]
pub enum FolioError {
    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Reasoning output that does not fit the closed action schema.
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Vectors of different lengths were compared or stored for one owner.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An external provider is down, misconfigured or timed out.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API rate limit exceeded, retry after {retry_after:?} seconds")]
    ApiRateLimit { retry_after: Option<u64> },

    #[error("API authentication error: {0}")]
    ApiAuth(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM rate limit exceeded, retry after {retry_after:?} seconds")]
    LlmRateLimit { retry_after: Option<u64> },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl FolioError {
    /// Errors after which a caller is expected to narrow capability instead
    /// of failing the whole request.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            FolioError::ServiceUnavailable(_)
                | FolioError::ApiRateLimit { .. }
                | FolioError::LlmRateLimit { .. }
        )
    }
}

/// Errors raised outside a handler body, such as extractor rejections, use
/// the same envelope as handler results.
impl IntoResponse for FolioError {
    fn into_response(self) -> Response {
        ApiResponse::<()>::from(self).into_response()
    }
}

pub type Result<T> = std::result::Result<T, FolioError>;
