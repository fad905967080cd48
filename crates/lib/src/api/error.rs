//! Mapping of library errors onto HTTP responses.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{Error, auth::AuthError};

/// An error on its way out of a handler: a status and a `{"detail": ...}` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = if err.is_conflict() {
            StatusCode::BAD_REQUEST
        } else if err.is_not_found() {
            StatusCode::NOT_FOUND
        } else if err.is_unauthorized() {
            StatusCode::UNAUTHORIZED
        } else if matches!(&err, Error::Auth(e) if e.is_validation_error()) {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(module = err.module(), "Request failed: {err}");
            return Self::new(status, "Internal server error");
        }

        // Expired tokens read the same as any other bad token.
        let detail = match &err {
            Error::Auth(AuthError::TokenExpired) => AuthError::InvalidToken {
                reason: String::new(),
            }
            .to_string(),
            _ => err.to_string(),
        };
        Self::new(status, detail)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status,
            Json(ErrorBody {
                detail: &self.detail,
            }),
        )
            .into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
