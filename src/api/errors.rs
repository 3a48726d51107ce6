//! Proxy error types and JSON error responses

use crate::signing::SigningError;
use crate::webhook::InvalidReason;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Errors returned by the webhook proxy
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(InvalidReason),

    #[error("unable to sign forwarded request: {0}")]
    Signing(#[from] SigningError),

    #[error("origin unavailable: {0}")]
    OriginUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

impl ProxyError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::InvalidPayload(_) => "InvalidPayload",
            ProxyError::InvalidSignature(_) => "InvalidSignature",
            ProxyError::Signing(_) => "SigningFailed",
            ProxyError::OriginUnavailable(_) => "OriginUnavailable",
            ProxyError::Internal(_) => "InternalError",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ProxyError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            ProxyError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::OriginUnavailable(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the logs; the caller gets the code only.
        let (message, reason) = match &self {
            ProxyError::InvalidPayload(_) => ("invalid payload".to_string(), None),
            ProxyError::InvalidSignature(reason) => {
                ("invalid signature".to_string(), Some(reason.label()))
            }
            ProxyError::Signing(_) | ProxyError::Internal(_) => {
                ("internal error".to_string(), None)
            }
            ProxyError::OriginUnavailable(_) => ("origin unavailable".to_string(), None),
        };
        let body = ErrorBody {
            code: self.code(),
            message,
            reason,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ProxyError::InvalidSignature(InvalidReason::SignatureMismatch).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ProxyError::InvalidPayload("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::from(SigningError::MissingRegion).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProxyError::OriginUnavailable("refused".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_invalid_signature_body() {
        let response =
            ProxyError::InvalidSignature(InvalidReason::TimestampOutOfWindow).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "InvalidSignature");
        assert_eq!(body["reason"], "timestamp_out_of_window");
    }

    #[tokio::test]
    async fn test_internal_details_not_leaked() {
        let response = ProxyError::Internal("db password=hunter2".into()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(!String::from_utf8_lossy(&bytes).contains("hunter2"));
    }
}
