//! # API Error Types
//!
//! Maps vault errors to HTTP status codes and a JSON body of the form
//! `{"error": {"code": ..., "message": ...}}`. Internal details are logged,
//! never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use receipt_vault::{IngestError, IssuanceError, VaultError, VerifyError};

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code, e.g. `NOT_FOUND`.
    pub code: String,
    pub message: String,
}

/// Application-level error returned by handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Webhook failed authentication or is malformed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Unknown token (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Credential rejected (401).
    #[error("unauthorized")]
    Unauthorized,

    /// Transient failure; the caller should retry (503).
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Stored payload does not match its commitment (500).
    #[error("integrity failure: {0}")]
    Integrity(String),

    /// Anything else (500).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            Self::Integrity(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTEGRITY_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::BadRequest(_) => "Webhook rejected".to_string(),
            Self::Unavailable(_) => "Temporarily unavailable, retry later".to_string(),
            Self::Integrity(_) | Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Integrity(_) | Self::Internal(_) => {
                tracing::error!(error = %self, "request failed");
            }
            Self::Unavailable(_) => tracing::warn!(error = %self, "request deferred"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<IssuanceError> for ApiError {
    fn from(err: IssuanceError) -> Self {
        if err.is_transient() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Ingest(e) => e.into(),
            VaultError::Issuance(e) => e.into(),
        }
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::NotFound(token_id) => Self::NotFound(format!("token {token_id}")),
            VerifyError::Integrity { .. } => Self::Integrity(err.to_string()),
            VerifyError::Store(e) if e.is_transient() => Self::Unavailable(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}
