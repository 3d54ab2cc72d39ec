//! Request extractors that reject with the crate's JSON error shape instead of
//! axum's plain-text rejections.

use axum::{
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Boundary checks on request bodies beyond what serde enforces.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// JSON body that has also passed [`Validate`]. Failures render as 400
/// `invalid_request`.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: Validate + Send,
    Json<T>: FromRequest<S, Rejection = AppError>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: axum::extract::Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate().map_err(AppError::BadRequest)?;
        Ok(Self(value))
    }
}

/// Shared field checks used by the `Validate` impls.
pub mod rules {
    pub const MAX_LICENSE_KEY_LEN: usize = 64;
    pub const MAX_SLUG_LEN: usize = 100;
    pub const MAX_INSTANCE_ID_LEN: usize = 500;
    pub const MAX_INSTANCE_NAME_LEN: usize = 255;
    pub const MAX_EMAIL_LEN: usize = 254;

    pub fn required(field: &str, value: &str, max_len: usize) -> Result<(), String> {
        if value.trim().is_empty() {
            return Err(format!("{} is required", field));
        }
        max_length(field, value, max_len)
    }

    pub fn max_length(field: &str, value: &str, max_len: usize) -> Result<(), String> {
        if value.chars().count() > max_len {
            return Err(format!("{} must be at most {} characters", field, max_len));
        }
        Ok(())
    }

    pub fn uuid(field: &str, value: &str) -> Result<(), String> {
        uuid::Uuid::parse_str(value.trim())
            .map(|_| ())
            .map_err(|_| format!("{} must be a UUID", field))
    }

    pub fn seats(field: &str, value: Option<i64>) -> Result<(), String> {
        match value {
            Some(n) if n < 1 => Err(format!("{} must be at least 1", field)),
            _ => Ok(()),
        }
    }

    /// Loose shape check: one `@`, non-empty local part, dotted domain, no
    /// whitespace.
    pub fn email(value: &str) -> Result<(), String> {
        let value = value.trim();
        let invalid = || Err(format!("invalid email address: {}", value));
        if value.len() > MAX_EMAIL_LEN || value.chars().any(char::is_whitespace) {
            return invalid();
        }
        let Some((local, domain)) = value.split_once('@') else {
            return invalid();
        };
        if local.is_empty() || domain.contains('@') {
            return invalid();
        }
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
            return invalid();
        }
        Ok(())
    }
}
