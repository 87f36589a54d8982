use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use parley_types::events::GatewayEvent;
use parley_types::models::{Notification, NotificationType, RefType, Thread};

use crate::Chat;

pub const MAX_BODY_CHARS: usize = 100;
const MAX_TITLE_CHARS: usize = 140;

/// Cut `text` to [`MAX_BODY_CHARS`] characters, marking the cut with `...`.
pub fn truncate_body(text: &str) -> String {
    if text.chars().count() <= MAX_BODY_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_BODY_CHARS).collect();
    out.push_str("...");
    out
}

/// Everything about a notification except who receives it.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub kind: NotificationType,
    pub title: String,
    pub body: Option<String>,
    pub ref_id: Option<Uuid>,
    pub ref_type: Option<RefType>,
}

impl NotificationDraft {
    pub fn new(kind: NotificationType, title: impl Into<String>) -> Self {
        let title: String = title.into();
        Self {
            kind,
            title: title.chars().take(MAX_TITLE_CHARS).collect(),
            body: None,
            ref_id: None,
            ref_type: None,
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn refers_to(mut self, ref_type: RefType, ref_id: Uuid) -> Self {
        self.ref_type = Some(ref_type);
        self.ref_id = Some(ref_id);
        self
    }

    fn for_recipient(&self, user_id: Uuid, at: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            kind: self.kind,
            title: self.title.clone(),
            body: self.body.clone(),
            ref_id: self.ref_id,
            ref_type: self.ref_type,
            read: false,
            created_at: at,
        }
    }
}

impl Chat {
    /// One notification for every member of `thread` except `exclude`.
    /// Returns how many were persisted.
    pub async fn notify_members(&self, thread: &Thread, exclude: Uuid, draft: NotificationDraft) -> usize {
        let recipients: Vec<Uuid> = thread.others(exclude).map(|m| m.user_id).collect();
        self.notify_users(&recipients, draft).await
    }

    pub async fn notify_user(&self, user_id: Uuid, draft: NotificationDraft) -> usize {
        self.notify_users(&[user_id], draft).await
    }

    /// Persist first, then push to whoever is online. A failed write is logged
    /// and dropped: the operation that triggered it has already committed.
    async fn notify_users(&self, recipients: &[Uuid], draft: NotificationDraft) -> usize {
        if recipients.is_empty() {
            return 0;
        }

        let now = Utc::now();
        let notifications: Vec<Notification> = recipients
            .iter()
            .map(|&user_id| draft.for_recipient(user_id, now))
            .collect();

        let batch = notifications.clone();
        if let Err(e) = self
            .store()
            .call("insert_notifications", move |db| db.insert_notifications(&batch))
            .await
        {
            warn!(
                "Dropping {} {} notification(s): {}",
                notifications.len(),
                draft.kind,
                e
            );
            return 0;
        }

        let persisted = notifications.len();
        let mut delivered = 0;
        for notification in notifications {
            let user_id = notification.user_id;
            if self
                .directory()
                .send_to_user(user_id, GatewayEvent::NotificationNew(notification))
            {
                delivered += 1;
            }
        }
        debug!(
            "{} notification fan-out: {} persisted, {} delivered live",
            draft.kind, persisted, delivered
        );
        persisted
    }
}
