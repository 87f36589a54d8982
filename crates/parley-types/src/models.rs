use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed string enums shared by the wire format and the store columns.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    /// Trust tier of a thread. Direct threads start as strangers unless the
    /// two users are already friends.
    ThreadKind {
        DirectStranger => "direct_stranger",
        DirectFriend => "direct_friend",
        Group => "group",
    }
);

wire_enum!(MemberRole {
    Member => "member",
    Admin => "admin",
});

wire_enum!(ContentType {
    Text => "text",
    File => "file",
    Poll => "poll",
    Schedule => "schedule",
});

wire_enum!(AttachmentKind {
    Image => "image",
    File => "file",
    Link => "link",
});

wire_enum!(NotificationType {
    FriendRequest => "friend_request",
    Message => "message",
    Schedule => "schedule",
    Group => "group",
    System => "system",
});

wire_enum!(RefType {
    Request => "request",
    Thread => "thread",
    Group => "group",
    Schedule => "schedule",
    Report => "report",
});

impl ThreadKind {
    pub fn is_direct(&self) -> bool {
        matches!(self, Self::DirectStranger | Self::DirectFriend)
    }

    /// The only legal kind change is stranger -> friend.
    pub fn can_transition_to(&self, next: ThreadKind) -> bool {
        matches!((self, next), (Self::DirectStranger, Self::DirectFriend))
    }
}

/// Canonical natural key of a direct thread: both user ids, sorted, joined by `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairKey(String);

impl PairKey {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        let (a, b) = (a.to_string(), b.to_string());
        if a <= b {
            Self(format!("{}_{}", a, b))
        } else {
            Self(format!("{}_{}", b, a))
        }
    }

    pub fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMember {
    pub user_id: Uuid,
    pub role: MemberRole,
    /// `None` until the member has read anything in the thread.
    pub last_read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    pub kind: ThreadKind,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub members: Vec<ThreadMember>,
    pub member_hash: Option<PairKey>,
    pub last_message_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    pub fn member(&self, user_id: Uuid) -> Option<&ThreadMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.member(user_id).is_some()
    }

    /// Every member except `user_id`, in membership order.
    pub fn others(&self, user_id: Uuid) -> impl Iterator<Item = &ThreadMember> {
        self.members.iter().filter(move |m| m.user_id != user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub mime: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub content_type: ContentType,
    pub content: Option<String>,
    pub attachments: Vec<Attachment>,
    /// Raw `user_id:emoji` tokens in insertion order.
    pub reactions: Vec<String>,
    pub read_by: Vec<Uuid>,
    pub deleted_for: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// The sender always counts as having read their own message.
    pub fn is_read_by(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id || self.read_by.contains(&user_id)
    }

    pub fn is_hidden_for(&self, user_id: Uuid) -> bool {
        self.deleted_for.contains(&user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub body: Option<String>,
    pub ref_id: Option<Uuid>,
    pub ref_type: Option<RefType>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(PairKey::new(a, b), PairKey::new(b, a));

        let (lo, hi) = if a.to_string() < b.to_string() { (a, b) } else { (b, a) };
        assert_eq!(PairKey::new(a, b).as_str(), format!("{}_{}", lo, hi));
    }

    #[test]
    fn only_stranger_to_friend_is_legal() {
        use ThreadKind::*;
        assert!(DirectStranger.can_transition_to(DirectFriend));
        for (from, to) in [
            (DirectFriend, DirectStranger),
            (Group, DirectFriend),
            (DirectStranger, Group),
            (DirectFriend, DirectFriend),
        ] {
            assert!(!from.can_transition_to(to), "{} -> {}", from, to);
        }
    }

    #[test]
    fn wire_names_round_trip() {
        assert_eq!(ThreadKind::parse("direct_stranger"), Some(ThreadKind::DirectStranger));
        assert_eq!(NotificationType::FriendRequest.as_str(), "friend_request");
        assert_eq!(ContentType::parse("video"), None);
        assert_eq!(
            serde_json::to_string(&ThreadKind::DirectFriend).unwrap(),
            "\"direct_friend\""
        );
    }

    #[test]
    fn sender_counts_as_reader() {
        let sender = Uuid::new_v4();
        let msg = Message {
            id: Uuid::new_v4(),
            thread_id: Uuid::new_v4(),
            sender_id: sender,
            content_type: ContentType::Text,
            content: Some("hi".into()),
            attachments: vec![],
            reactions: vec![],
            read_by: vec![],
            deleted_for: vec![],
            created_at: Utc::now(),
        };
        assert!(msg.is_read_by(sender));
        assert!(!msg.is_read_by(Uuid::new_v4()));
    }
}
