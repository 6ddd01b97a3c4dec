//! HTTP error type for the dashboard API.
//!
//! Every error renders as `{"error": "<message>"}`. Server-side causes are
//! logged and replaced with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::data::FetchError;

/// Dashboard API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Upstream data could not be assembled into a response
    #[error("{0}")]
    NoData(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NoData(_) | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = %e, "Request failed");
        Self::Internal
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        error!(error = %e, "Market data fetch failed");
        Self::NoData(e.to_string())
    }
}

impl From<pulse_common::Error> for ApiError {
    fn from(e: pulse_common::Error) -> Self {
        if !e.is_client_error() {
            error!(error = %e, "Request failed");
            return Self::Internal;
        }

        let message = e.to_string();
        match e.status_code() {
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            _ => Self::BadRequest(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NoData("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::Internal.to_string(), "Internal server error");
    }

    #[test]
    fn test_from_common_error_hides_internals() {
        let err = ApiError::from(pulse_common::Error::Storage("disk I/O at /var/db".into()));
        assert!(matches!(err, ApiError::Internal));

        let err = ApiError::from(pulse_common::Error::Conflict("busy".into()));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_from_fetch_error() {
        let err = ApiError::from(FetchError::EmptyRegistry);
        assert_eq!(err.to_string(), "Symbol registry is empty");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
