//! Authentication middleware for axum.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::ApiKeyValidator;

/// Error response for authentication failures.
#[derive(Debug, Serialize)]
pub struct AuthError {
    pub error: String,
    pub code: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

/// Extract and validate API key from request.
///
/// Looks for `X-API-Key` header or `Authorization: Bearer <key>` header.
pub async fn require_api_key(
    State(validator): State<ApiKeyValidator>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let api_key = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .or_else(|| {
            request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(String::from)
        })
        .ok_or_else(|| AuthError {
            error: "Missing API key".to_string(),
            code: "MISSING_API_KEY".to_string(),
        })?;

    let key_info = validator.validate(&api_key).ok_or_else(|| {
        tracing::warn!(path = %request.uri().path(), "Invalid API key attempted");
        AuthError {
            error: "Invalid API key".to_string(),
            code: "INVALID_API_KEY".to_string(),
        }
    })?;

    tracing::debug!(key_id = %key_info.key_id, client_id = %key_info.client_id, "API key accepted");
    request.extensions_mut().insert(key_info);

    Ok(next.run(request).await)
}
