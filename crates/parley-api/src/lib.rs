//! HTTP surface of the messaging service. Handlers translate requests into
//! [`Chat`] calls and wrap results in the `{success, message, data}` envelope.

pub mod error;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod reactions;
pub mod threads;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};

use parley_chat::Chat;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub chat: Chat,
    pub jwt_secret: String,
}

/// Every route requires a bearer token.
pub fn router(state: AppState) -> Router {
    Router::new()
        // -- Messages --
        .route("/chat/message", post(messages::send_message))
        .route("/chat/message/file", post(messages::send_files))
        .route("/chat/message/{message_id}", delete(messages::delete_message))
        .route("/chat/message/{message_id}/hide", post(messages::hide_message))
        .route(
            "/chat/message/{message_id}/reaction",
            post(reactions::add_reaction).delete(reactions::remove_reaction),
        )
        .route("/chat/message/{message_id}/reactions", get(reactions::list_reactions))
        .route("/chat/read", post(messages::mark_read))
        .route("/chat/unread", get(messages::unread_count))
        // -- Threads --
        .route("/thread", get(threads::list_threads))
        .route("/thread/strangers", get(threads::list_strangers))
        .route("/thread/groups", get(threads::list_groups))
        .route("/thread/group", post(threads::create_group))
        .route("/thread/{thread_id}", get(threads::get_thread))
        .route("/thread/{thread_id}/attachments", get(threads::list_attachments))
        .route("/thread/{thread_id}/out", post(threads::leave_thread))
        // -- Notifications --
        .route("/noti", get(notifications::list_notifications))
        .route("/noti/unread", get(notifications::unread_count))
        .route("/noti/read", post(notifications::mark_all_read))
        .route("/noti/{notification_id}/read", post(notifications::mark_read))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state)
}
