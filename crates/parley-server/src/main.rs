mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use parley_api::error::ApiError;
use parley_api::middleware::decode_token;
use parley_api::{AppStateInner, router};
use parley_chat::Chat;
use parley_gateway::connection;
use parley_gateway::dispatcher::Dispatcher;

use crate::config::Config;

#[derive(Clone)]
struct GatewayState {
    chat: Chat,
    jwt_secret: Arc<str>,
}

#[derive(Debug, Deserialize)]
struct GatewayQuery {
    token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(parley_db::Database::open(&config.db_path)?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let chat = Chat::new(db, Arc::new(dispatcher), config.store_timeout);

    let api = router(Arc::new(AppStateInner {
        chat: chat.clone(),
        jwt_secret: config.jwt_secret.clone(),
    }));

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(GatewayState {
            chat,
            jwt_secret: config.jwt_secret.as_str().into(),
        });

    let routes = api.merge(ws_route);
    let app = if config.base_path.is_empty() {
        routes
    } else {
        Router::new().nest(&config.base_path, routes)
    }
    .layer(CorsLayer::permissive())
    .layer(TraceLayer::new_for_http());

    info!("Parley server listening on {}{}", config.addr, config.base_path);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// The bearer token rides in the query string since browsers can't set
/// headers on a WebSocket handshake.
async fn ws_upgrade(
    State(state): State<GatewayState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let claims = query
        .token
        .as_deref()
        .and_then(|token| decode_token(token, &state.jwt_secret));
    let Some(claims) = claims else {
        warn!("Gateway upgrade rejected: missing or invalid token");
        return ApiError::unauthorized().into_response();
    };

    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.chat, claims.sub, claims.username)
    })
}
