//! Database row types. These map directly to SQLite rows and are converted
//! into parley-types models at the edge of each query.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use tracing::warn;
use uuid::Uuid;

use parley_types::models::{
    Attachment, ContentType, MemberRole, Message, Notification, NotificationType, PairKey,
    RefType, Thread, ThreadKind, ThreadMember,
};

pub struct ThreadRow {
    pub id: String,
    pub kind: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub member_hash: Option<String>,
    pub last_message_id: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MemberRow {
    pub thread_id: String,
    pub user_id: String,
    pub role: String,
    pub last_read_at: Option<String>,
}

pub struct MessageRow {
    pub id: String,
    pub thread_id: String,
    pub sender_id: String,
    pub content_type: String,
    pub content: Option<String>,
    pub attachments: String,
    pub created_at: String,
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub body: Option<String>,
    pub ref_id: Option<String>,
    pub ref_type: Option<String>,
    pub read: bool,
    pub created_at: String,
}

/// Timestamps are stored as fixed-width RFC 3339 so they sort lexically.
pub fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone; treat it as UTC.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub fn parse_id(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}': {}", raw, e);
        Uuid::default()
    })
}

impl MemberRow {
    pub fn into_member(self) -> ThreadMember {
        ThreadMember {
            user_id: parse_id(&self.user_id),
            role: MemberRole::parse(&self.role).unwrap_or_else(|| {
                warn!("Unknown role '{}' in thread {}", self.role, self.thread_id);
                MemberRole::Member
            }),
            last_read_at: self.last_read_at.as_deref().map(parse_ts),
        }
    }
}

impl ThreadRow {
    pub fn into_thread(self, members: Vec<ThreadMember>) -> Thread {
        Thread {
            id: parse_id(&self.id),
            kind: ThreadKind::parse(&self.kind).unwrap_or_else(|| {
                warn!("Unknown kind '{}' on thread {}", self.kind, self.id);
                ThreadKind::Group
            }),
            name: self.name,
            avatar: self.avatar,
            members,
            member_hash: self.member_hash.map(PairKey::from_stored),
            last_message_id: self.last_message_id.as_deref().map(parse_id),
            created_by: parse_id(&self.created_by),
            created_at: parse_ts(&self.created_at),
            updated_at: parse_ts(&self.updated_at),
        }
    }
}

impl MessageRow {
    /// Reactions, read receipts and hides live in side tables; the caller fills them in.
    pub fn into_message(self) -> Message {
        let attachments: Vec<Attachment> =
            serde_json::from_str(&self.attachments).unwrap_or_else(|e| {
                warn!("Corrupt attachments on message '{}': {}", self.id, e);
                Vec::new()
            });

        Message {
            id: parse_id(&self.id),
            thread_id: parse_id(&self.thread_id),
            sender_id: parse_id(&self.sender_id),
            content_type: ContentType::parse(&self.content_type).unwrap_or_else(|| {
                warn!("Unknown content type '{}' on message {}", self.content_type, self.id);
                ContentType::Text
            }),
            content: self.content,
            attachments,
            reactions: Vec::new(),
            read_by: Vec::new(),
            deleted_for: Vec::new(),
            created_at: parse_ts(&self.created_at),
        }
    }
}

impl NotificationRow {
    pub fn into_notification(self) -> Notification {
        Notification {
            id: parse_id(&self.id),
            user_id: parse_id(&self.user_id),
            kind: NotificationType::parse(&self.kind).unwrap_or_else(|| {
                warn!("Unknown notification type '{}' on {}", self.kind, self.id);
                NotificationType::System
            }),
            title: self.title,
            body: self.body,
            ref_id: self.ref_id.as_deref().map(parse_id),
            ref_type: self.ref_type.as_deref().and_then(RefType::parse),
            read: self.read,
            created_at: parse_ts(&self.created_at),
        }
    }
}
