use uuid::Uuid;

use parley_types::models::Notification;

use crate::error::{ChatError, Result};
use crate::{Chat, require_identity};

impl Chat {
    // -- Notification inbox --

    pub async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        require_identity(user_id)?;
        self.store()
            .call("list_notifications", move |db| db.list_notifications(user_id))
            .await
    }

    pub async fn unread_notification_count(&self, user_id: Uuid) -> Result<usize> {
        require_identity(user_id)?;
        self.store()
            .call("count_unread_notifications", move |db| {
                db.count_unread_notifications(user_id)
            })
            .await
    }

    pub async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<usize> {
        require_identity(user_id)?;
        self.store()
            .call("mark_all_notifications_read", move |db| {
                db.mark_all_notifications_read(user_id)
            })
            .await
    }

    /// Notifications belonging to someone else look missing.
    pub async fn mark_notification_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<()> {
        require_identity(user_id)?;
        let found = self
            .store()
            .call("mark_notification_read", move |db| {
                db.mark_notification_read(user_id, notification_id)
            })
            .await?;
        if !found {
            return Err(ChatError::not_found("Notification not found"));
        }
        Ok(())
    }
}
