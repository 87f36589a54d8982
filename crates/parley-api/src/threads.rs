use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use parley_types::api::{ApiResponse, Claims, CreateGroupRequest};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::actor;

/// Friend and group threads.
pub async fn list_threads(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let threads = state
        .chat
        .list_threads(claims.sub)
        .await
        .map_err(ApiError::not_found)?;
    Ok(Json(ApiResponse::ok("Threads", threads)))
}

pub async fn list_strangers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let threads = state
        .chat
        .list_strangers(claims.sub)
        .await
        .map_err(ApiError::not_found)?;
    Ok(Json(ApiResponse::ok("Stranger threads", threads)))
}

pub async fn list_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let threads = state
        .chat
        .list_groups(claims.sub)
        .await
        .map_err(ApiError::not_found)?;
    Ok(Json(ApiResponse::ok("Groups", threads)))
}

pub async fn get_thread(
    State(state): State<AppState>,
    WithRejection(Path(thread_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .chat
        .get_thread_detail(thread_id, claims.sub)
        .await
        .map_err(ApiError::not_found)?;
    Ok(Json(ApiResponse::ok("Thread", detail)))
}

pub async fn list_attachments(
    State(state): State<AppState>,
    WithRejection(Path(thread_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let attachments = state
        .chat
        .list_attachments(thread_id, claims.sub)
        .await
        .map_err(ApiError::not_found)?;
    Ok(Json(ApiResponse::ok("Attachments", attachments)))
}

pub async fn create_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<CreateGroupRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let thread = state
        .chat
        .create_group(&actor(&claims), &req.name, &req.member_ids, req.avatar)
        .await
        .map_err(ApiError::bad_request)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Group created", thread))))
}

pub async fn leave_thread(
    State(state): State<AppState>,
    WithRejection(Path(thread_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .chat
        .leave(thread_id, claims.sub)
        .await
        .map_err(ApiError::bad_request)?;
    Ok(Json(ApiResponse::<()>::done("Left thread")))
}
