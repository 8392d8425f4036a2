/// HTTP error mapping
///
/// Turns engine errors into JSON error bodies with a status code per error kind.

use crate::error::EngineError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

#[derive(Debug)]
pub enum ApiError {
    /// Missing or unusable actor headers
    Unauthenticated(String),
    /// Malformed query parameters
    BadRequest(String),
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Engine(err) => match err {
                EngineError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                EngineError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
                EngineError::MalformedDefinition(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "MALFORMED_DEFINITION")
                }
                EngineError::IncompleteDefinition(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "INCOMPLETE_DEFINITION")
                }
                EngineError::IllegalTransition(_) => (StatusCode::CONFLICT, "ILLEGAL_TRANSITION"),
                EngineError::InvalidChoice { .. } => (StatusCode::CONFLICT, "INVALID_CHOICE"),
                EngineError::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
                EngineError::Unauthorized(_) => (StatusCode::FORBIDDEN, "UNAUTHORIZED"),
                EngineError::Storage(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_ERROR"),
            },
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthenticated(reason) => write!(f, "unauthenticated: {}", reason),
            ApiError::BadRequest(reason) => write!(f, "bad request: {}", reason),
            ApiError::Engine(err) => write!(f, "{}", err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if let ApiError::Engine(EngineError::Storage(reason)) = &self {
            tracing::error!("❌ Storage failure while serving request: {}", reason);
        }

        let details = match &self {
            ApiError::Engine(EngineError::IncompleteDefinition(issues)) => {
                Some(issues.iter().map(|issue| issue.to_string()).collect())
            }
            _ => None,
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type ApiResult<T> = Result<T, ApiError>;
