//! Error types for suggest-api

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use suggest_common::api::MessageResponse;
use thiserror::Error;

use crate::services::AggregateError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Upstream dependency unavailable (503)
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Pipeline failure (500)
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Aggregate(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Upstream details stay in the logs
            ApiError::Aggregate(_) => "Error retrieving suggestions".to_string(),
            other => other.to_string(),
        };

        (status, Json(MessageResponse::new(message))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
