//! Error types for the pdfdesk server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdfdesk_core::PdfDeskError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Pdf(#[from] PdfDeskError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No result is available for this session")]
    NoResult,

    #[error("Session not found")]
    UnknownSession,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl ServerError {
    fn parts(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            ServerError::Pdf(err) => match err {
                PdfDeskError::MissingDependency { hint, .. } => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "MISSING_DEPENDENCY",
                    Some(hint.clone()),
                ),
                PdfDeskError::NothingFound(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "NOTHING_FOUND", None)
                }
                PdfDeskError::Encrypted => (StatusCode::BAD_REQUEST, "ENCRYPTED_PDF", None),
                PdfDeskError::ParseError(_) => (StatusCode::BAD_REQUEST, "INVALID_PDF", None),
                PdfDeskError::InvalidRange(_) => (StatusCode::BAD_REQUEST, "INVALID_RANGE", None),
                PdfDeskError::ImageError(_) => (StatusCode::BAD_REQUEST, "INVALID_IMAGE", None),
                err if err.is_user_error() => (StatusCode::BAD_REQUEST, "INVALID_INPUT", None),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "OPERATION_FAILED", None),
            },
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST", None),
            ServerError::NoResult => (StatusCode::NOT_FOUND, "NO_RESULT", None),
            ServerError::UnknownSession => (StatusCode::NOT_FOUND, "UNKNOWN_SESSION", None),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code, hint) = self.parts();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            error!(code, error = %self, "request failed");
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code,
            hint,
        };

        (status, Json(body)).into_response()
    }
}
