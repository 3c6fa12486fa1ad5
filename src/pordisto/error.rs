//! Error taxonomy for the auth endpoints.
//!
//! Internal detail is logged server-side and never leaks into a response
//! body. Authentication failures share one uniform message regardless of
//! which factor was wrong.

use axum::{
    http::{header::InvalidHeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// The one message every credential failure surfaces.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Error)]
pub enum Error {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("invalid email or password")]
    Authentication,
    #[error("email already registered")]
    Conflict,
    #[error("too many attempts")]
    RateLimited,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<InvalidHeaderValue> for Error {
    fn from(err: InvalidHeaderValue) -> Self {
        Self::Internal(anyhow::Error::new(err))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Self::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": message, "field": field })),
            )
                .into_response(),
            Self::Authentication => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": INVALID_CREDENTIALS })),
            )
                .into_response(),
            Self::Conflict => (
                StatusCode::CONFLICT,
                Json(json!({ "error": "Email already registered" })),
            )
                .into_response(),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "Too many attempts, please try again later" })),
            )
                .into_response(),
            Self::Internal(err) => {
                error!("Unhandled error: {err:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "An unexpected error occurred" })),
                )
                    .into_response()
            }
        }
    }
}
