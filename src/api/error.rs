//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::UpstreamError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("Analysis request timed out")]
    UpstreamTimeout { timeout_secs: u64 },
    #[error("Analysis service unavailable: {0}")]
    Upstream(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                detail.clone(),
            ),
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Too many requests. Retry after {retry_after}s"),
            ),
            ApiError::UpstreamTimeout { timeout_secs } => (
                StatusCode::REQUEST_TIMEOUT,
                "UPSTREAM_TIMEOUT",
                format!("Analysis timed out after {timeout_secs}s"),
            ),
            ApiError::Upstream(detail) => {
                // Credential and transport detail stays in the log.
                tracing::error!(detail, "Upstream analysis failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "UPSTREAM_FAILED",
                    "Analysis service temporarily unavailable".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after } = &self {
            if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Timeout(timeout_secs) => ApiError::UpstreamTimeout { timeout_secs },
            // The completion service throttled us; surface it as a client 429.
            UpstreamError::RateLimited => ApiError::RateLimited { retry_after: 60 },
            UpstreamError::AuthFailure => {
                ApiError::Upstream("completion service rejected credentials".into())
            }
            UpstreamError::Unreachable(detail) => ApiError::Upstream(detail),
            UpstreamError::MalformedResponse(detail) => ApiError::Upstream(detail),
        }
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn bad_request_returns_400_with_detail() {
        let response = ApiError::BadRequest("Symptoms description is required".into())
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
        assert_eq!(json["error"]["message"], "Symptoms description is required");
    }

    #[tokio::test]
    async fn rate_limited_returns_429_with_retry_after() {
        let response = ApiError::RateLimited { retry_after: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "42");
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn upstream_timeout_returns_408() {
        let response = ApiError::UpstreamTimeout { timeout_secs: 30 }.into_response();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "UPSTREAM_TIMEOUT");
    }

    #[tokio::test]
    async fn upstream_failure_hides_detail_from_client() {
        let response =
            ApiError::Upstream("401 from https://api.cohere.ai with key sk-123".into())
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "UPSTREAM_FAILED");
        assert_eq!(
            json["error"]["message"],
            "Analysis service temporarily unavailable"
        );
    }

    #[tokio::test]
    async fn auth_failure_maps_to_generic_500() {
        let api_err: ApiError = UpstreamError::AuthFailure.into();
        let response = api_err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(!String::from_utf8_lossy(&body).contains("credentials"));
    }

    #[tokio::test]
    async fn upstream_rate_limit_maps_to_429() {
        let api_err: ApiError = UpstreamError::RateLimited.into();
        let response = api_err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn timeout_maps_with_duration() {
        let api_err: ApiError = UpstreamError::Timeout(30).into();
        assert!(matches!(api_err, ApiError::UpstreamTimeout { timeout_secs: 30 }));
    }
}
