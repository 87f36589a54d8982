use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use parley_types::api::{ApiResponse, Claims, ReactionRequest};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::actor;

pub async fn add_reaction(
    State(state): State<AppState>,
    WithRejection(Path(message_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<ReactionRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let reactions = state
        .chat
        .add_reaction(&actor(&claims), message_id, &req.emoji)
        .await
        .map_err(ApiError::bad_request)?;

    Ok(Json(ApiResponse::ok("Reaction added", reactions)))
}

pub async fn remove_reaction(
    State(state): State<AppState>,
    WithRejection(Path(message_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<ReactionRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let reactions = state
        .chat
        .remove_reaction(claims.sub, message_id, &req.emoji)
        .await
        .map_err(ApiError::bad_request)?;

    Ok(Json(ApiResponse::ok("Reaction removed", reactions)))
}

pub async fn list_reactions(
    State(state): State<AppState>,
    WithRejection(Path(message_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let reactions = state
        .chat
        .reactions(claims.sub, message_id)
        .await
        .map_err(ApiError::not_found)?;

    Ok(Json(ApiResponse::ok("Reactions", reactions)))
}
