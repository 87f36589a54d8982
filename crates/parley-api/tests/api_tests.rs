use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use parley_api::{AppStateInner, router};
use parley_chat::Chat;
use parley_db::Database;
use parley_gateway::dispatcher::Dispatcher;
use parley_types::api::Claims;

const SECRET: &str = "api-test-secret";

struct User {
    id: Uuid,
    token: String,
}

fn user(name: &str) -> User {
    let id = Uuid::new_v4();
    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .checked_add(Duration::from_secs(3600))
        .unwrap()
        .as_secs() as usize;
    let claims = Claims {
        sub: id,
        username: name.to_string(),
        exp,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    User { id, token }
}

fn app() -> Router {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let chat = Chat::new(db, Arc::new(Dispatcher::new()), Duration::from_secs(5));
    router(Arc::new(AppStateInner {
        chat,
        jwt_secret: SECRET.to_string(),
    }))
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_requests_without_valid_token_are_rejected() {
    let app = app();

    let (status, body) = call(&app, "GET", "/thread", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = call(&app, "GET", "/thread", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_first_message_flow() {
    let app = app();
    let (ana, ben) = (user("ana"), user("ben"));

    let (status, body) = call(
        &app,
        "POST",
        "/chat/message",
        Some(&ana.token),
        Some(json!({ "recipient_id": ben.id, "content": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["content"], "hello");
    let thread_id = body["data"]["thread_id"].as_str().unwrap().to_string();

    let (_, body) = call(&app, "GET", "/thread/strangers", Some(&ben.token), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = call(&app, "GET", "/chat/unread", Some(&ben.token), None).await;
    assert_eq!(body["data"]["total"], 1);

    let (_, body) = call(&app, "GET", "/noti/unread", Some(&ben.token), None).await;
    assert_eq!(body["data"]["count"], 1);

    let (status, body) = call(
        &app,
        "POST",
        "/chat/read",
        Some(&ben.token),
        Some(json!({ "thread_id": thread_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["updated"], 1);

    let uri = format!("/chat/unread?thread_id={}", thread_id);
    let (_, body) = call(&app, "GET", &uri, Some(&ben.token), None).await;
    assert_eq!(body["data"]["total"], 0);

    let (status, body) = call(&app, "GET", &format!("/thread/{}", thread_id), Some(&ben.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_validation_failures_use_envelope() {
    let app = app();
    let (ana, ben) = (user("ana"), user("ben"));

    let (status, body) = call(
        &app,
        "POST",
        "/chat/message",
        Some(&ana.token),
        Some(json!({ "recipient_id": ben.id, "content": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Message content cannot be empty");

    let (status, body) = call(
        &app,
        "POST",
        "/chat/message",
        Some(&ana.token),
        Some(json!({ "content": 42 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = call(&app, "POST", "/chat/read", Some(&ana.token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_foreign_thread_lookup_is_not_found() {
    let app = app();
    let ana = user("ana");

    let uri = format!("/thread/{}", Uuid::new_v4());
    let (status, body) = call(&app, "GET", &uri, Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_reaction_routes() {
    let app = app();
    let (ana, ben) = (user("ana"), user("ben"));

    let (_, body) = call(
        &app,
        "POST",
        "/chat/message",
        Some(&ana.token),
        Some(json!({ "recipient_id": ben.id, "content": "vote" })),
    )
    .await;
    let message_id = body["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/chat/message/{}/reaction", message_id);

    let (status, body) = call(&app, "POST", &uri, Some(&ben.token), Some(json!({ "emoji": "👍" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["reactions"][0]["count"], 1);

    let (status, body) = call(&app, "POST", &uri, Some(&ben.token), Some(json!({ "emoji": "👍" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You have already added this reaction");

    let list_uri = format!("/chat/message/{}/reactions", message_id);
    let (status, body) = call(&app, "GET", &list_uri, Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["reactions"][0]["emoji"], "👍");
    assert_eq!(body["data"]["reactions"][0]["user_ids"][0], ben.id.to_string());

    let (status, body) = call(&app, "DELETE", &uri, Some(&ben.token), Some(json!({ "reaction": "👍" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["reactions"].as_array().unwrap().is_empty());

    let stranger = user("eve");
    let (status, _) = call(&app, "GET", &list_uri, Some(&stranger.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_message_routes() {
    let app = app();
    let (ana, ben) = (user("ana"), user("ben"));

    let (_, body) = call(
        &app,
        "POST",
        "/chat/message",
        Some(&ana.token),
        Some(json!({ "recipient_id": ben.id, "content": "oops" })),
    )
    .await;
    let uri = format!("/chat/message/{}", body["data"]["id"].as_str().unwrap());

    let (status, _) = call(&app, "DELETE", &uri, Some(&ben.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&app, "DELETE", &uri, Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["last_message_id"].is_null());
}

#[tokio::test]
async fn test_group_and_notification_routes() {
    let app = app();
    let (owner, member) = (user("olga"), user("max"));

    let (status, body) = call(
        &app,
        "POST",
        "/thread/group",
        Some(&owner.token),
        Some(json!({ "name": "Book club", "member_ids": [member.id] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let group_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = call(&app, "GET", "/thread/groups", Some(&member.token), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = call(&app, "GET", "/noti", Some(&member.token), None).await;
    let notifications = body["data"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["type"], "group");
    let notification_id = notifications[0]["id"].as_str().unwrap().to_string();

    let uri = format!("/noti/{}/read", notification_id);
    let (status, _) = call(&app, "POST", &uri, Some(&owner.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(&app, "POST", &uri, Some(&member.token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, "POST", "/noti/read", Some(&member.token), None).await;
    assert_eq!(body["data"]["updated"], 0);

    let uri = format!("/thread/{}/out", group_id);
    let (status, _) = call(&app, "POST", &uri, Some(&member.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, "POST", &uri, Some(&member.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_ids_use_envelope() {
    let app = app();
    let ana = user("ana");

    for (method, uri) in [
        ("GET", "/thread/not-a-uuid"),
        ("DELETE", "/chat/message/42"),
        ("GET", "/chat/message/xyz/reactions"),
        ("POST", "/noti/nope/read"),
    ] {
        let (status, body) = call(&app, method, uri, Some(&ana.token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
        assert_eq!(body["success"], false, "{method} {uri}");
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    }
}

#[tokio::test]
async fn test_left_member_cannot_post_by_recipient() {
    let app = app();
    let (ana, ben) = (user("ana"), user("ben"));

    let (_, body) = call(
        &app,
        "POST",
        "/chat/message",
        Some(&ana.token),
        Some(json!({ "recipient_id": ben.id, "content": "hi" })),
    )
    .await;
    let thread_id = body["data"]["thread_id"].as_str().unwrap().to_string();

    let uri = format!("/thread/{}/out", thread_id);
    let (status, _) = call(&app, "POST", &uri, Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        "POST",
        "/chat/message",
        Some(&ana.token),
        Some(json!({ "recipient_id": ben.id, "content": "again" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, body) = call(&app, "GET", &format!("/thread/{}", thread_id), Some(&ben.token), None).await;
    assert_eq!(body["data"]["messages"].as_array().unwrap().len(), 1);
}
