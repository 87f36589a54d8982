use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use axum_extra::typed_header::TypedHeaderRejection;
use axum_extra::headers::{Authorization, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use parley_chat::Actor;
use parley_types::api::Claims;

use crate::AppState;
use crate::error::ApiError;

/// Validate an HS256 token against `secret`.
pub fn decode_token(token: &str, secret: &str) -> Option<Claims> {
    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            debug!("Rejected bearer token: {}", e);
            None
        }
    }
}

/// Extract and validate the bearer token, then hand the claims to the handler
/// as an extension.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|_| ApiError::unauthorized())?;
    let claims = decode_token(bearer.token(), &state.jwt_secret).ok_or_else(ApiError::unauthorized)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn actor(claims: &Claims) -> Actor {
    Actor::new(claims.sub, claims.username.clone())
}
