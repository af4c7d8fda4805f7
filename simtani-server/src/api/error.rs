//! Mapping of failures to HTTP responses.
//!
//! Every error body has the shape `{ "error": <kind>, "message": <text> }`.
//! Storage details are logged by the service and never reach the body.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use simtani_core::{ErrorKind, RegistryError};

#[derive(Debug)]
pub enum ApiError {
    Registry(RegistryError),
    /// No usable caller identity.
    Unauthorized(String),
    /// The caller's role may not perform the operation.
    Forbidden(String),
    /// The request body could not be decoded.
    MalformedBody(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Registry(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Registry(e) => e.kind().as_str(),
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::MalformedBody(_) => ErrorKind::InvalidInput.as_str(),
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Registry(e) => e.public_message(),
            Self::Unauthorized(m) | Self::Forbidden(m) | Self::MalformedBody(m) => m.clone(),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        Self::Registry(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedBody(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.code(),
            "message": self.message(),
        });
        (self.status(), Json(body)).into_response()
    }
}
