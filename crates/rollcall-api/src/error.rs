//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps ledger and validation errors to HTTP status codes and a JSON body
//! with a machine-readable code. Internal error details never reach the
//! client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rollcall_core::ValidationError;
use rollcall_ledger::{LedgerError, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "INVALID_CREDENTIAL", "MALFORMED_ITEM").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Offending entries of a rejected override batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Presented credential is not the current one for any student (401).
    #[error("credential is not valid")]
    InvalidCredential,

    /// Student is not on the roster (404).
    #[error("unknown student: {0}")]
    UnknownStudent(String),

    /// Override batch rejected as a whole (400). `details` lists the
    /// offending entries with their index and reason.
    #[error("{message}")]
    MalformedItem {
        message: String,
        details: serde_json::Value,
    },

    /// Request body or query could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Authentication failure, missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authorization failure, insufficient role (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Store or calendar temporarily unreachable (503). Clients may retry.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::InvalidCredential => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIAL"),
            Self::UnknownStudent(_) => (StatusCode::NOT_FOUND, "UNKNOWN_STUDENT"),
            Self::MalformedItem { .. } => (StatusCode::BAD_REQUEST, "MALFORMED_ITEM"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::ServiceUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let details = match self {
            Self::MalformedItem { details, .. } => Some(details),
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidCredential => Self::InvalidCredential,
            LedgerError::UnknownStudent(id) => Self::UnknownStudent(id.to_string()),
            LedgerError::EmptyBatch => Self::MalformedItem {
                message: err.to_string(),
                details: serde_json::Value::Array(Vec::new()),
            },
            LedgerError::MalformedBatch(ref items) => Self::MalformedItem {
                message: err.to_string(),
                details: serde_json::to_value(items)
                    .unwrap_or_else(|_| serde_json::Value::Array(Vec::new())),
            },
            LedgerError::Calendar(e) => Self::ServiceUnavailable(e.to_string()),
            LedgerError::Store(StoreError::Unavailable(reason)) => {
                // The reason can carry driver detail; keep it in the logs.
                tracing::error!(%reason, "attendance store unavailable");
                Self::ServiceUnavailable("attendance store unavailable".to_string())
            }
            LedgerError::Store(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
