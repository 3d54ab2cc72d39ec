//! Error types shared by the domain services and the HTTP boundary.
//!
//! Domain failures come in exactly three kinds (not found, validation,
//! conflict), each carrying a stable [`ErrorCode`]. Storage failures are a
//! separate, uncoded surface that renders as a generic 500.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Machine-readable codes surfaced to API callers. The string forms are a
/// stable contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    BrandNotFound,
    BrandInactive,
    NoProducts,
    ProductNotFound,
    ProductBrandMismatch,
    ProductInactive,
    KeyExists,
    KeyNotFound,
    LicenseExists,
    LicenseNotFound,
    LicenseInvalid,
    NoSeatsAvailable,
    ActivationNotFound,
    InvalidStateTransition,
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Referenced entity is absent or not visible to the caller
    #[error("{message}")]
    NotFound { code: ErrorCode, message: String },

    /// Well-formed request that breaks a business rule
    #[error("{message}")]
    Validation { code: ErrorCode, message: String },

    /// Request would break a uniqueness invariant
    #[error("{message}")]
    Conflict { code: ErrorCode, message: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn validation(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    /// Domain code, if this is one of the three domain kinds.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::NotFound { code, .. }
            | Self::Validation { code, .. }
            | Self::Conflict { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Database(_) | Self::Pool(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, message) = match &self {
            Self::NotFound { code, message }
            | Self::Validation { code, message }
            | Self::Conflict { code, message } => (code.as_ref(), message.clone()),
            Self::BadRequest(msg) => ("invalid_request", msg.clone()),
            Self::Unauthorized(msg) => ("unauthorized", msg.clone()),
            Self::Forbidden(msg) => ("forbidden", msg.clone()),
            Self::Database(_) | Self::Pool(_) | Self::Internal(_) => {
                tracing::error!("Request failed: {}", self);
                ("internal_error", "Internal server error".to_string())
            }
        };

        (
            status,
            Json(ErrorBody {
                error: ErrorDetail { code, message },
            }),
        )
            .into_response()
    }
}
