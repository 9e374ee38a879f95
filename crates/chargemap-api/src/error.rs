//! API error types and JSON error response formatting.
//!
//! ApiError provides a consistent JSON error response format across all
//! endpoints, mapping internal errors to appropriate HTTP status codes.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use chargemap_core::error::ChargemapError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "not_found", "LOGIN_BAD_CREDENTIALS").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request with a stable machine-readable code.
    BadRequest { code: &'static str, message: String },
    /// 401 Unauthorized - missing, expired or unknown bearer token.
    Unauthorized(String),
    /// 404 Not Found - resource does not exist.
    NotFound(String),
    /// 413 Payload Too Large.
    PayloadTooLarge(String),
    /// 422 Unprocessable Entity - request parsed but failed validation.
    UnprocessableEntity(String),
    /// 500 Internal Server Error - details are logged, not returned.
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let unauthorized = matches!(self, ApiError::Unauthorized(_));

        let (error_code, message) = match self {
            ApiError::BadRequest { code, message } => (code.to_string(), message),
            ApiError::Unauthorized(msg) => ("unauthorized".to_string(), msg),
            ApiError::NotFound(msg) => ("not_found".to_string(), msg),
            ApiError::PayloadTooLarge(msg) => ("payload_too_large".to_string(), msg),
            ApiError::UnprocessableEntity(msg) => ("unprocessable_entity".to_string(), msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    "internal_error".to_string(),
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: error_code,
            message,
        };

        let mut response = (status, Json(body)).into_response();
        if unauthorized {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<ChargemapError> for ApiError {
    fn from(err: ChargemapError) -> Self {
        match err {
            ChargemapError::Validation(msg) => ApiError::UnprocessableEntity(msg),
            ChargemapError::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::UnprocessableEntity(rejection.body_text())
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::UnprocessableEntity(rejection.body_text())
    }
}

/// A path that does not parse (e.g. a malformed UUID) names no resource.
impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::NotFound(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> ErrorBody {
        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_internal_error_sanitized() {
        let resp = ApiError::Internal("disk I/O failed at /var/db".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body.error, "internal_error");
        assert!(!body.message.contains("/var/db"));
    }

    #[tokio::test]
    async fn test_bad_request_uses_code() {
        let resp = ApiError::BadRequest {
            code: "LOGIN_BAD_CREDENTIALS",
            message: "Bad credentials".to_string(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body.error, "LOGIN_BAD_CREDENTIALS");
    }

    #[tokio::test]
    async fn test_unauthorized_sets_www_authenticate() {
        let resp = ApiError::Unauthorized("Missing Authorization header".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn test_validation_maps_to_422() {
        let err: ApiError = ChargemapError::Validation("lat".to_string()).into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err: ApiError = ChargemapError::NotFound("x".to_string()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_storage_error_maps_to_500() {
        let err: ApiError = ChargemapError::Storage("locked".to_string()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
