use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::response::{ApiResponse, Meta};

/// Failure taxonomy for the whole API. Every variant maps to exactly one
/// status code so clients can branch on the condition, not on message text.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing input, rejected before any mutation happens.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Referenced cart, line, product or order does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Checkout attempted against a cart with no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// Missing, malformed or expired credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but the role does not permit the operation.
    #[error("forbidden")]
    Forbidden,

    /// Storage failure. Nothing was partially applied; safe to retry.
    #[error("storage failure, safe to retry")]
    Database(#[from] sqlx::Error),

    /// The order-persist step of checkout failed. The cart was left
    /// untouched and the whole checkout may be retried.
    #[error("checkout failed: {0}")]
    CheckoutFailed(String),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidArgument(_) | AppError::EmptyCart => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Database(_) | AppError::CheckoutFailed(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                error: self.to_string(),
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
