//! Error types for the admin API and the core stores.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors raised by [`MockRegistry`](crate::registry::MockRegistry) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No mock is registered for the given route.
    #[error("no mock registered for {method} {path}")]
    NotFound { method: String, path: String },
}

/// Per-request errors reported to admin API callers.
///
/// Every variant is recoverable; it maps to a status code and a short
/// `text/plain` body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Malformed or unreadable request body.
    #[error("{0}")]
    InvalidInput(String),

    /// Wrong HTTP verb on an admin endpoint; carries the allowed verb.
    #[error("Only {0} allowed")]
    MethodNotAllowed(&'static str),

    /// No mock for the requested route, or delete target absent.
    #[error("404 page not found")]
    NotFound,
}

impl ApiError {
    /// HTTP status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound { .. } => ApiError::NotFound,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
