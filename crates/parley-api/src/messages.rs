use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use parley_chat::ReadTarget;
use parley_types::api::{
    ApiResponse, Claims, DeleteMessageResponse, MarkReadRequest, MarkReadResponse,
    SendFilesRequest, SendMessageRequest, UnreadQuery,
};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::actor;

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .chat
        .send_text(&actor(&claims), req.thread_id, req.recipient_id, &req.content)
        .await
        .map_err(ApiError::bad_request)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Message sent", message))))
}

pub async fn send_files(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<SendFilesRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state
        .chat
        .send_with_attachments(&actor(&claims), req.thread_id, req.content.as_deref(), &req.files)
        .await
        .map_err(ApiError::bad_request)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Files sent", messages))))
}

pub async fn delete_message(
    State(state): State<AppState>,
    WithRejection(Path(message_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let last_message_id = state
        .chat
        .delete_for_self(message_id, claims.sub)
        .await
        .map_err(ApiError::bad_request)?;

    Ok(Json(ApiResponse::ok(
        "Message deleted",
        DeleteMessageResponse {
            message_id,
            last_message_id,
        },
    )))
}

pub async fn hide_message(
    State(state): State<AppState>,
    WithRejection(Path(message_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .chat
        .hide_for_self(message_id, claims.sub)
        .await
        .map_err(ApiError::bad_request)?;

    Ok(Json(ApiResponse::<()>::done("Message hidden")))
}

/// Exactly one of `message_id` / `thread_id`. If both are sent the message wins.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<MarkReadRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let target = match (req.message_id, req.thread_id) {
        (Some(message_id), _) => ReadTarget::Message(message_id),
        (None, Some(thread_id)) => ReadTarget::Thread(thread_id),
        (None, None) => {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "Message ID or thread ID is required",
            ));
        }
    };

    let updated = state
        .chat
        .mark_read(claims.sub, target)
        .await
        .map_err(ApiError::bad_request)?;

    Ok(Json(ApiResponse::ok("Marked as read", MarkReadResponse { updated })))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Query(query), _): WithRejection<Query<UnreadQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let counts = state
        .chat
        .unread_counts(claims.sub, query.thread_id)
        .await
        .map_err(ApiError::bad_request)?;

    Ok(Json(ApiResponse::ok("Unread count", counts)))
}
