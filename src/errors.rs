use std::fmt::Debug;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::responses::JsonResponse;

/// Failures surfaced to HTTP clients. The display string is the client-facing message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),
    /// A policy refused the request: self-delete, self role change, last privileged holder.
    #[error("{0}")]
    Guard(String),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    AlreadyExists(&'static str),
    /// Unknown email and wrong password look the same from outside.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    InvalidToken(&'static str),
    #[error("{0}")]
    ExpiredToken(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Internal(&'static str),
}

impl AppError {
    /// Logs `err` and returns a 500 whose body carries only `message`.
    pub fn internal(message: &'static str, err: impl Debug) -> Self {
        tracing::error!(error = ?err, "{message}");
        AppError::Internal(message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Guard(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::InvalidCredentials
            | AppError::Unauthorized(_)
            | AppError::InvalidToken(_)
            | AppError::ExpiredToken(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        JsonResponse::error(self.status(), &self.to_string())
    }
}
