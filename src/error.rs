use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::StoreError;
use crate::services::ownership::AuthorizationError;
use crate::services::token::AuthError;
use crate::services::votes::VoteError;
use crate::utils::auth::HashingError;

/// The JSON body every endpoint answers with unless it returns data.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub error: bool,
    pub message: String,
}

/// A `200 OK` with `{"error": false, "message": ...}`.
pub fn message(msg: impl Into<String>) -> (StatusCode, Json<Envelope>) {
    (
        StatusCode::OK,
        Json(Envelope {
            error: false,
            message: msg.into(),
        }),
    )
}

/// Every way a request can fail, as seen at the HTTP boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    #[error("password incorrect")]
    WrongPassword,

    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hashing(#[from] HashingError),
}

impl From<VoteError> for ApiError {
    fn from(err: VoteError) -> Self {
        match err {
            VoteError::OptionNotInPoll => ApiError::Validation(err.to_string()),
            VoteError::Store(e) => ApiError::Store(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(AuthError::Signing(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) | ApiError::WrongPassword => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(AuthorizationError::InvalidId) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(AuthorizationError::NotAuthorized) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(AuthorizationError::Store(e)) | ApiError::Store(e) => {
                store_status(e)
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the logs. Clients get a generic message.
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "service temporarily unavailable".to_string(),
                _ => "internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = Envelope {
            error: true,
            message,
        };
        (status, Json(body)).into_response()
    }
}
