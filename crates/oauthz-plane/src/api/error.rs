//! API error types and responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::issuance::{Disposition, IssuanceError};

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Only `Reject` and `ServerFault` errors become API errors; callers handle
/// `RestartLogin` with a redirect before converting.
impl From<IssuanceError> for ApiError {
    fn from(err: IssuanceError) -> Self {
        match err.disposition() {
            Disposition::Reject => ApiError::BadRequest(err.to_string()),
            Disposition::RestartLogin | Disposition::ServerFault => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::BadRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Internal("x".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_from_issuance_error() {
        assert!(matches!(
            ApiError::from(IssuanceError::BadRequest("unsupported service".into())),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(IssuanceError::SigningFailed("offline".into())),
            ApiError::Internal(_)
        ));
    }
}
