//! Handbooks service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl and are
//! rendered inside the standard response envelope. Messages returned to
//! clients for server-side failures are generic; the actual error is
//! logged here.

use crate::middleware::request_id::current_request_id;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Handbooks service error type.
///
/// Maps to HTTP status codes:
/// - BadRequest: 400 Bad Request
/// - InvalidCredentials, InvalidToken: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - NotFound: 404 Not Found
/// - Conflict, UniqueViolation: 409 Conflict
/// - Database, Cache, Crypto, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum HbError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A write hit a unique constraint. Callers that know the constraint
    /// turn this into a specific `Conflict`.
    #[error("Unique constraint {constraint} violated on {table}")]
    UniqueViolation { table: String, constraint: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl HbError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            HbError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HbError::InvalidCredentials | HbError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            HbError::Forbidden(_) => StatusCode::FORBIDDEN,
            HbError::NotFound(_) => StatusCode::NOT_FOUND,
            HbError::Conflict(_) | HbError::UniqueViolation { .. } => StatusCode::CONFLICT,
            HbError::Database(_) | HbError::Cache(_) | HbError::Crypto(_) | HbError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    status: u16,
    success: bool,
    error: ErrorDetail,
    request_id: String,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for HbError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            HbError::BadRequest(reason) => ("BAD_REQUEST", reason.clone()),
            HbError::InvalidCredentials => {
                ("INVALID_CREDENTIALS", "Invalid credentials".to_string())
            }
            HbError::InvalidToken(reason) => ("INVALID_TOKEN", reason.clone()),
            HbError::Forbidden(reason) => ("FORBIDDEN", reason.clone()),
            HbError::NotFound(resource) => ("NOT_FOUND", resource.clone()),
            HbError::Conflict(reason) => ("CONFLICT", reason.clone()),
            HbError::UniqueViolation { table, constraint } => {
                tracing::debug!(target: "hb.store", table = %table, constraint = %constraint, "Unique constraint violated");
                ("CONFLICT", "The record already exists".to_string())
            }
            HbError::Database(err) => {
                tracing::error!(target: "hb.database", error = %err, "Database operation failed");
                (
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            HbError::Cache(err) => {
                tracing::error!(target: "hb.cache", error = %err, "Token cache operation failed");
                ("CACHE_ERROR", "An internal error occurred".to_string())
            }
            HbError::Crypto(err) => {
                tracing::error!(target: "hb.crypto", error = %err, "Cryptographic operation failed");
                (
                    "CRYPTO_ERROR",
                    "An internal cryptographic error occurred".to_string(),
                )
            }
            HbError::Internal(err) => {
                tracing::error!(target: "hb.internal", error = %err, "Internal error");
                ("INTERNAL_ERROR", "An internal error occurred".to_string())
            }
        };

        let status = self.status_code();
        let envelope = ErrorEnvelope {
            status: status.as_u16(),
            success: false,
            error: ErrorDetail { code, message },
            request_id: current_request_id().unwrap_or_default(),
        };

        let mut response = (status, Json(envelope)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"handbooks\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
