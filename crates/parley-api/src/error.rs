use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use parley_chat::ChatError;
use parley_types::api::ApiResponse;

/// Failure response: the status plus a `{success:false, message}` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    /// Route policy where every user-facing failure is a 400.
    pub fn bad_request(err: ChatError) -> Self {
        Self::from_chat(err, StatusCode::BAD_REQUEST)
    }

    /// Route policy for lookups: bad input is a 400, anything else the caller
    /// can't see is a 404.
    pub fn not_found(err: ChatError) -> Self {
        match err {
            ChatError::Validation(message) => Self::new(StatusCode::BAD_REQUEST, message),
            other => Self::from_chat(other, StatusCode::NOT_FOUND),
        }
    }

    fn from_chat(err: ChatError, fallback: StatusCode) -> Self {
        match err {
            ChatError::NotAuthorized(message) => Self::new(StatusCode::UNAUTHORIZED, message),
            ChatError::Transient(message) => {
                error!("Request failed on storage: {}", message);
                Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
            }
            ChatError::Validation(message)
            | ChatError::Forbidden(message)
            | ChatError::NotFound(message)
            | ChatError::Conflict(message) => Self::new(fallback, message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::failure(self.message))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}
