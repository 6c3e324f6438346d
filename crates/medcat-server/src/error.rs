//! Server-level error type
//!
//! Feature routes map their own error enums to responses; [`AppError`] covers the
//! service handlers that live outside a feature slice.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::response::ErrorResponse;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Unavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", message)
            },
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

/// Alias for handler results using [`AppError`]
pub type ApiResult<T> = Result<T, AppError>;
