//! Error types for Reputation Core.
//!
//! Defines a unified error type that maps cleanly to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Unified error type for Reputation Core operations.
#[derive(Debug, Error)]
pub enum ReputationError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Cross-entity mismatch, e.g. a score that belongs to another entity.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReputationError {
    /// Map a unique-constraint violation to `Conflict`, keep anything else as a database error.
    pub fn from_insert(err: sqlx::Error, what: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ReputationError::Conflict(format!("{} already exists", what.into()))
            }
            _ => ReputationError::Database(err),
        }
    }
}

/// Error response body for API clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ReputationError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            ReputationError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None)
            }
            ReputationError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone(), None),
            ReputationError::InvalidArgument(msg) => (
                StatusCode::BAD_REQUEST,
                "INVALID_ARGUMENT",
                msg.clone(),
                None,
            ),
            ReputationError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
            ReputationError::Database(e) => {
                // Log the actual error but don't expose internals
                tracing::error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    None,
                )
            }
            ReputationError::Serialization(e) => {
                // Stored JSON that no longer decodes
                tracing::error!(error = %e, "Serialization error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SERIALIZATION_ERROR",
                    "Failed to process stored data".to_string(),
                    None,
                )
            }
            ReputationError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for Reputation operations.
pub type ReputationResult<T> = Result<T, ReputationError>;
