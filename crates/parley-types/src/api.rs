use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Attachment, Message, Thread};

// -- JWT Claims --

/// Claims carried by bearer tokens. Tokens are issued elsewhere; both the REST
/// middleware and the gateway upgrade validate against this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Envelope --

/// Uniform response body: `{ success, message, data? }`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub thread_id: Option<Uuid>,
    /// Used to open (or find) a direct thread when `thread_id` is absent.
    pub recipient_id: Option<Uuid>,
    pub content: String,
}

/// An already-uploaded file. Upload handling lives outside this service.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileRef {
    pub url: String,
    pub mime: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendFilesRequest {
    pub thread_id: Uuid,
    pub content: Option<String>,
    #[serde(default)]
    pub files: Vec<FileRef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkReadRequest {
    pub message_id: Option<Uuid>,
    pub thread_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    /// How many read receipts were newly recorded.
    pub updated: usize,
}

#[derive(Debug, Deserialize)]
pub struct UnreadQuery {
    pub thread_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadUnread {
    pub thread_id: Uuid,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadCount {
    pub total: usize,
    pub threads: Vec<ThreadUnread>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteMessageResponse {
    pub message_id: Uuid,
    pub last_message_id: Option<Uuid>,
}

// -- Reactions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactionRequest {
    #[serde(alias = "reaction")]
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub emoji: String,
    pub count: usize,
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReactions {
    pub message_id: Uuid,
    pub reactions: Vec<ReactionGroup>,
}

// -- Threads --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGroupRequest {
    pub name: String,
    pub member_ids: Vec<Uuid>,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadDetail {
    pub thread: Thread,
    /// Oldest first, hidden-for-viewer messages removed.
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadAttachment {
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub attachment: Attachment,
}

// -- Notifications --

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationCount {
    pub count: usize,
}
