use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::forms::FieldErrors;
use crate::store::StoreError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    #[error("Authentication error: {0}")]
    Unauthorized(String),

    /// A protected action was requested without a session. Answered with a
    /// redirect to the login page that preserves the original destination.
    #[error("Login required to access {next}")]
    LoginRequired { next: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation(FieldErrors::single(field, message))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::LoginRequired { .. } => StatusCode::SEE_OTHER,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::LoginRequired { .. } => "LOGIN_REQUIRED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::Validation(fields) => {
                warn!(fields = ?fields, "Rejected form input");
            }
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => {
                warn!(code = self.code(), message = %msg, "Request failed");
            }
            AppError::LoginRequired { next } => {
                tracing::debug!(next = %next, "Redirecting anonymous request to login");
            }
            AppError::Internal(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::Database(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Duplicate(what) => AppError::Conflict(format!("{what} already in use")),
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::QuotaExceeded { remaining } => AppError::field(
                "quantity",
                format!("Only {remaining} ticket(s) of this type remain"),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        let (public_message, details) = match self {
            AppError::LoginRequired { next } => {
                return Redirect::to(&login_redirect_target(&next)).into_response();
            }
            AppError::Validation(fields) => (
                "Please correct the highlighted fields".to_string(),
                Some(json!({ "fields": fields })),
            ),
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => (msg, None),
            // Do not expose internal details in the API response
            AppError::Internal(_) => ("An internal error occurred".to_string(), None),
            AppError::Database(_) => ("A database error occurred".to_string(), None),
        };

        error_response(code, public_message, details, status)
    }
}

/// Builds `/login?next=<path>` with the path percent-encoded.
pub fn login_redirect_target(next: &str) -> String {
    format!("/login?next={}", urlencoding::encode(next))
}
