use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use parley_types::api::{ApiResponse, Claims, MarkReadResponse, NotificationCount};

use crate::AppState;
use crate::error::ApiError;

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let notifications = state
        .chat
        .list_notifications(claims.sub)
        .await
        .map_err(ApiError::not_found)?;
    Ok(Json(ApiResponse::ok("Notifications", notifications)))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let count = state
        .chat
        .unread_notification_count(claims.sub)
        .await
        .map_err(ApiError::not_found)?;
    Ok(Json(ApiResponse::ok("Unread notifications", NotificationCount { count })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .chat
        .mark_all_notifications_read(claims.sub)
        .await
        .map_err(ApiError::bad_request)?;
    Ok(Json(ApiResponse::ok("Notifications marked as read", MarkReadResponse { updated })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    WithRejection(Path(notification_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .chat
        .mark_notification_read(claims.sub, notification_id)
        .await
        .map_err(ApiError::bad_request)?;
    Ok(Json(ApiResponse::<()>::done("Notification marked as read")))
}
