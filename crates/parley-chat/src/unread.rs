use uuid::Uuid;

use parley_types::api::{ThreadUnread, UnreadCount};

use crate::error::Result;
use crate::{Chat, require_identity};

impl Chat {
    /// Unread messages per thread across everything `user_id` belongs to, or
    /// only `thread_id` when given. Messages the user sent, read or hid don't count.
    pub async fn unread_counts(&self, user_id: Uuid, thread_id: Option<Uuid>) -> Result<UnreadCount> {
        require_identity(user_id)?;
        if let Some(thread_id) = thread_id {
            self.assert_member(thread_id, user_id).await?;
        }

        let rows = self
            .store()
            .call("unread_counts", move |db| db.unread_counts(user_id, thread_id))
            .await?;

        let threads: Vec<ThreadUnread> = rows
            .into_iter()
            .map(|(thread_id, count)| ThreadUnread { thread_id, count })
            .collect();
        Ok(UnreadCount {
            total: threads.iter().map(|t| t.count).sum(),
            threads,
        })
    }
}
